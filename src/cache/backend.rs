//! Storage backends for cache entries.
//!
//! A backend only moves opaque bytes under a fingerprint; expiry and
//! encoding live in [`super::ResponseCache`].

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

use super::keys::Fingerprint;
use super::lock::{rw_read, rw_write};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cache entry `{key}` could not be decoded: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache entry `{key}` cannot expire {ttl_secs}s from now")]
    Expiry { key: String, ttl_secs: u64 },
    #[error("cache entry `{key}` could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    fn io(key: &Fingerprint, source: std::io::Error) -> Self {
        Self::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Minimal key/value capability behind the response cache.
///
/// Implementations must tolerate concurrent access to distinct keys.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn put(&self, key: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError>;

    async fn get(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError>;

    /// Removing a missing entry succeeds.
    async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError>;
}

// ============================================================================
// File backend
// ============================================================================

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores each entry as a file named by its hex fingerprint.
#[derive(Debug, Clone)]
pub struct FileBackend {
    directory: PathBuf,
}

impl FileBackend {
    /// The directory is created lazily on the first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &Fingerprint) -> PathBuf {
        self.directory.join(key.as_str())
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn put(&self, key: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| CacheError::io(key, err))?;

        // Readers never observe a half-written entry: write aside, then rename.
        let temp = self.directory.join(format!(
            ".{key}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, value)
            .await
            .map_err(|err| CacheError::io(key, err))?;
        if let Err(err) = fs::rename(&temp, self.path_for(key)).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io(key, err));
        }
        Ok(())
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CacheError::io(key, err)),
        }
    }

    async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::io(key, err)),
        }
    }
}

// ============================================================================
// Memory backend
// ============================================================================

/// In-process backend, mostly useful for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<Fingerprint, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn contains(&self, key: &Fingerprint) -> bool {
        rw_read(&self.entries, "memory_contains").contains_key(key)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        rw_read(&self.entries, "memory_len").len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn put(&self, key: &Fingerprint, value: Vec<u8>) -> Result<(), CacheError> {
        rw_write(&self.entries, "memory_put").insert(key.clone(), value);
        Ok(())
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(rw_read(&self.entries, "memory_get").get(key).cloned())
    }

    async fn delete(&self, key: &Fingerprint) -> Result<(), CacheError> {
        rw_write(&self.entries, "memory_delete").remove(key);
        Ok(())
    }
}
