//! Cache configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_DIR: &str = "/tmp/cohort-cache";

/// Where cache entries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One file per fingerprint under `directory`.
    File,
    /// Process-local map; entries vanish on exit.
    Memory,
}

/// Cache configuration from `cohort.toml`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Route API calls through the cache at all.
    pub enabled: bool,
    pub backend: BackendKind,
    /// Directory for the file backend.
    pub directory: PathBuf,
    /// Lifetime of a stored response.
    pub ttl: Duration,
    /// Also store non-success responses, replaying them as errors on hit.
    pub persist_errors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: BackendKind::File,
            directory: PathBuf::from(DEFAULT_CACHE_DIR),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            persist_errors: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            directory: settings.directory.clone(),
            ttl: settings.ttl,
            persist_errors: settings.persist_errors,
        }
    }
}
