//! Content fingerprinting
//!
//! Derives the content-addressed cache key for a recognition input.
//! Equal byte sequences always map to the same key, so a repeated
//! submission can be answered from the result cache without invoking
//! the engine.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed cache key: lowercase-hex SHA-256 of the input bytes.
///
/// Serializes as a plain string so it can key the JSON cache store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex digest as a string slice (64 characters).
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a byte buffer.
///
/// Deterministic and side-effect free; the empty buffer hashes to the
/// standard SHA-256 empty digest rather than being an error.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Fingerprint(format!("{:x}", hasher.finalize()))
}
