//! Cache key fingerprints.
//!
//! A request is identified by an ordered list of string fragments (URL,
//! canonical params, credential parts). The fragments are fed one by one into
//! a SHA-256 digest, so `[a, b]` and `[b, a]` produce different keys.

use std::fmt;

use sha2::{Digest, Sha256};

/// Hex digest naming one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest the key parts in order.
    pub fn of<S: AsRef<str>>(parts: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_ref().as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
