//! Response cache.
//!
//! Every remote call is keyed by an ordered list of string fragments and
//! routed through [`ResponseCache`], which keeps self-contained response
//! snapshots for a configurable time-to-live.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "file"        # or "memory"
//! directory = "/tmp/cohort-cache"
//! ttl_seconds = 3600
//! persist_errors = false
//! ```

mod backend;
mod config;
mod keys;
mod lock;
mod store;

pub use backend::{CacheBackend, CacheError, FileBackend, MemoryBackend};
pub use config::{BackendKind, CacheConfig};
pub use keys::Fingerprint;
pub use store::{CachedResponse, ResponseCache};
