//! Identity key derivation.

use config::LimitKey;
use hashing::{hash_parts, sha256_hex};

use crate::RateLimitRequest;

/// Stand-in for an attribute the request did not carry.
///
/// All clients missing the same attribute share one bucket instead of escaping the limit.
pub const UNKNOWN_IDENTITY: &str = "unknown";

const GLOBAL_IDENTITY: &str = "global";

/// Derive the identity a tier counts this request against.
///
/// Identical attributes always produce the same key.
pub fn identity_key(key: LimitKey, request: &RateLimitRequest) -> String {
    match key {
        LimitKey::Ip => sha256_hex(request.ip.as_deref().unwrap_or(UNKNOWN_IDENTITY)),
        LimitKey::Fingerprint => hash_parts(&[
            request.user_agent.as_deref().unwrap_or(UNKNOWN_IDENTITY),
            request.accept_language.as_deref().unwrap_or(UNKNOWN_IDENTITY),
        ]),
        LimitKey::Global => GLOBAL_IDENTITY.to_string(),
    }
}
