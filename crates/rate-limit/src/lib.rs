//! Request rate limiting for the voice endpoints.
//!
//! This crate provides fixed-window rate limiting with support for:
//! - Per-IP limits, keyed by a hash of the forwarded client address
//! - Per-fingerprint limits, keyed by a hash of `user-agent` and `accept-language`
//! - Global limits shared by every request
//!
//! Counters live in process memory. Every server instance enforces its own view of the limits.

#![deny(missing_docs)]

mod error;
mod identity;
mod manager;
mod request;
mod storage;

pub use error::RateLimitError;
pub use identity::{UNKNOWN_IDENTITY, identity_key};
pub use manager::{RateLimitManager, RateLimitOutcome};
pub use request::{RateLimitRequest, RateLimitRequestBuilder};
