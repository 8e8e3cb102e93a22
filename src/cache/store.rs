//! TTL response cache on top of a [`CacheBackend`].

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::backend::{CacheBackend, CacheError, FileBackend, MemoryBackend};
use super::config::{BackendKind, CacheConfig};
use super::keys::Fingerprint;

const METRIC_CACHE_HIT: &str = "cohort_cache_hit_total";
const METRIC_CACHE_MISS: &str = "cohort_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "cohort_cache_expired_total";

/// Self-contained snapshot of a remote response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub encoding: Option<String>,
    pub body: String,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(with = "time::serde::timestamp::nanoseconds")]
    expires_at: OffsetDateTime,
    payload: CachedResponse,
}

/// Keyed cache of remote responses with a fixed time-to-live.
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Build the configured backend, or `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let backend: Arc<dyn CacheBackend> = match config.backend {
            BackendKind::File => Arc::new(FileBackend::new(config.directory.clone())),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        Some(Self::new(backend, config.ttl))
    }

    /// Store `payload` under `parts`, replacing any previous entry.
    pub async fn store<S: AsRef<str>>(
        &self,
        parts: &[S],
        payload: CachedResponse,
    ) -> Result<(), CacheError> {
        self.store_at(parts, payload, OffsetDateTime::now_utc())
            .await
    }

    pub async fn store_at<S: AsRef<str>>(
        &self,
        parts: &[S],
        payload: CachedResponse,
        now: OffsetDateTime,
    ) -> Result<(), CacheError> {
        let key = Fingerprint::of(parts);
        let expires_at = time::Duration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| CacheError::Expiry {
                key: key.to_string(),
                ttl_secs: self.ttl.as_secs(),
            })?;
        let entry = CacheEntry {
            expires_at,
            payload,
        };
        let bytes = serde_json::to_vec(&entry).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.put(&key, bytes).await
    }

    /// Look up `parts`; expired, unreadable and corrupt entries are misses.
    pub async fn fetch<S: AsRef<str>>(&self, parts: &[S]) -> Option<CachedResponse> {
        self.fetch_at(parts, OffsetDateTime::now_utc()).await
    }

    pub async fn fetch_at<S: AsRef<str>>(
        &self,
        parts: &[S],
        now: OffsetDateTime,
    ) -> Option<CachedResponse> {
        let key = Fingerprint::of(parts);
        let entry = match self.load(&key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
            Err(err) => {
                warn!(
                    target = "cohort::cache",
                    op = "cache::fetch",
                    result = "read_error",
                    key = %key,
                    error = %err,
                    "Unreadable cache entry treated as a miss"
                );
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
        };

        if entry.expires_at <= now {
            debug!(
                target = "cohort::cache",
                op = "cache::fetch",
                result = "expired",
                key = %key,
                "Cache entry expired"
            );
            counter!(METRIC_CACHE_EXPIRED).increment(1);
            counter!(METRIC_CACHE_MISS).increment(1);
            self.forget(&key).await;
            return None;
        }

        counter!(METRIC_CACHE_HIT).increment(1);
        Some(entry.payload)
    }

    /// Remove the entry under `parts` if there is one.
    pub async fn delete<S: AsRef<str>>(&self, parts: &[S]) {
        self.forget(&Fingerprint::of(parts)).await;
    }

    async fn load(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let Some(bytes) = self.backend.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    async fn forget(&self, key: &Fingerprint) {
        if let Err(err) = self.backend.delete(key).await {
            warn!(
                target = "cohort::cache",
                op = "cache::delete",
                result = "error",
                key = %key,
                error = %err,
                "Failed to remove cache entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            encoding: Some("utf-8".into()),
            body: body.into(),
        }
    }

    fn memory_cache(ttl_secs: u64) -> (Arc<MemoryBackend>, ResponseCache) {
        let backend = Arc::new(MemoryBackend::new());
        let cache = ResponseCache::new(backend.clone(), Duration::from_secs(ttl_secs));
        (backend, cache)
    }

    #[tokio::test]
    async fn fetch_returns_stored_payload_before_expiry() {
        let (_, cache) = memory_cache(60);
        let now = OffsetDateTime::now_utc();

        cache
            .store_at(&["url", "params"], response("{}"), now)
            .await
            .expect("store");

        let hit = cache
            .fetch_at(&["url", "params"], now + Duration::from_secs(59))
            .await
            .expect("hit");
        assert_eq!(hit, response("{}"));
    }

    #[tokio::test]
    async fn expired_entry_is_absent_and_removed() {
        let (backend, cache) = memory_cache(60);
        let now = OffsetDateTime::now_utc();

        cache
            .store_at(&["url"], response("old"), now)
            .await
            .expect("store");
        assert!(backend.contains(&Fingerprint::of(&["url"])));

        let miss = cache
            .fetch_at(&["url"], now + Duration::from_secs(61))
            .await;
        assert!(miss.is_none());
        assert!(!backend.contains(&Fingerprint::of(&["url"])));
    }

    #[tokio::test]
    async fn key_parts_are_order_sensitive() {
        let (_, cache) = memory_cache(60);
        cache
            .store(&["b", "a"], response("ba"))
            .await
            .expect("store");

        assert!(cache.fetch(&["a", "b"]).await.is_none());
        assert!(cache.fetch(&["b", "a"]).await.is_some());
    }

    #[tokio::test]
    async fn store_overwrites_existing_entry() {
        let (_, cache) = memory_cache(60);
        cache.store(&["k"], response("one")).await.expect("store");
        cache.store(&["k"], response("two")).await.expect("store");

        assert_eq!(cache.fetch(&["k"]).await.expect("hit").body, "two");
    }

    #[tokio::test]
    async fn corrupt_file_is_a_miss() {
        let dir = TempDir::new().expect("temp dir");
        let backend = Arc::new(FileBackend::new(dir.path()));
        let cache = ResponseCache::new(backend.clone(), Duration::from_secs(60));
        let key = Fingerprint::of(&["broken"]);

        backend
            .put(&key, b"not json at all".to_vec())
            .await
            .expect("put");

        assert!(cache.fetch(&["broken"]).await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry_and_tolerates_absence() {
        let (backend, cache) = memory_cache(60);
        cache.delete(&["never-stored"]).await;

        cache.store(&["k"], response("v")).await.expect("store");
        cache.delete(&["k"]).await;
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn sub_second_expiry_survives_storage() {
        let (_, cache) = memory_cache(1);
        let stored_at = OffsetDateTime::now_utc()
            .replace_nanosecond(900_000_000)
            .expect("valid nanosecond");

        cache
            .store_at(&["k"], response("fresh"), stored_at)
            .await
            .expect("store");

        let before = stored_at + Duration::from_millis(500);
        assert!(cache.fetch_at(&["k"], before).await.is_some());
        let after = stored_at + Duration::from_millis(1000);
        assert!(cache.fetch_at(&["k"], after).await.is_none());
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_an_error() {
        let (backend, cache) = memory_cache(u64::MAX / 2);

        let err = cache
            .store(&["k"], response("v"))
            .await
            .expect_err("expiry overflows");

        assert!(matches!(err, CacheError::Expiry { .. }));
        assert!(backend.is_empty());
    }

    #[test]
    fn disabled_config_builds_no_cache() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(ResponseCache::from_config(&config).is_none());
    }
}
