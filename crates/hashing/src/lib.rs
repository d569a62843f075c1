//! Hashing helpers shared by the rate limiter and the TTS deduplicator.
//!
//! Identity keys and content fingerprints are both hex encoded SHA-256 digests,
//! so raw client attributes (IP addresses, user agents, lesson text) never end up
//! as map keys or in log lines.

#![deny(missing_docs)]

use sha2::{Digest, Sha256};

/// Hash a single string into a lowercase hex SHA-256 digest.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash an ordered list of parts into a lowercase hex SHA-256 digest.
///
/// Every part is prefixed with its byte length, so no choice of part contents can make two
/// different lists produce the same input to the hash.
pub fn hash_parts(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();

    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}
