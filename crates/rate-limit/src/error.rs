//! Error types for rate limiting.

use std::time::Duration;

use config::LimitKey;

/// A request was rejected because one of its tiers is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// The named tier has no capacity left in its current window.
    #[error("Rate limit exceeded for tier {limit}")]
    LimitExceeded {
        /// The first tier that rejected the request.
        limit: LimitKey,
        /// Whole seconds until the tier's window resets.
        retry_after: u64,
    },
}

impl RateLimitError {
    /// Get the retry-after duration.
    pub fn retry_after(&self) -> Duration {
        match self {
            Self::LimitExceeded { retry_after, .. } => Duration::from_secs(*retry_after),
        }
    }

    /// The tier that rejected the request.
    pub fn limit(&self) -> LimitKey {
        match self {
            Self::LimitExceeded { limit, .. } => *limit,
        }
    }
}
