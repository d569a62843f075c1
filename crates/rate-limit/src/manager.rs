//! Rate limit manager implementation.

use std::time::Duration;

use config::{LimitKey, RateLimitTier};

use crate::error::RateLimitError;
use crate::identity::identity_key;
use crate::request::RateLimitRequest;
use crate::storage::{CheckResult, InMemoryStorage, WindowCheck};

/// Outcome of checking a request against its tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOutcome {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// The first tier that rejected the request.
    pub exceeded_limit: Option<LimitKey>,
    /// Whole seconds until the rejecting tier's window resets.
    pub retry_after: Option<u64>,
}

impl RateLimitOutcome {
    fn admitted() -> Self {
        Self {
            allowed: true,
            exceeded_limit: None,
            retry_after: None,
        }
    }

    fn rejected(limit: LimitKey, retry_after: u64) -> Self {
        Self {
            allowed: false,
            exceeded_limit: Some(limit),
            retry_after: Some(retry_after),
        }
    }

    /// Convert into a `Result`, with a rejection becoming [`RateLimitError::LimitExceeded`].
    pub fn into_result(self) -> Result<(), RateLimitError> {
        match (self.allowed, self.exceeded_limit) {
            (false, Some(limit)) => Err(RateLimitError::LimitExceeded {
                limit,
                retry_after: self.retry_after.unwrap_or(1),
            }),
            _ => Ok(()),
        }
    }
}

/// Manager for fixed-window rate limiting over any number of tiers.
///
/// Holds the counter table only. Tiers are passed on every check.
#[derive(Debug, Default)]
pub struct RateLimitManager {
    storage: InMemoryStorage,
}

impl RateLimitManager {
    /// Create a new rate limit manager with an empty counter table.
    pub fn new() -> Self {
        Self {
            storage: InMemoryStorage::new(),
        }
    }

    /// Check a request against all the given tiers.
    ///
    /// Tiers are evaluated in order and the first exhausted tier is reported. A request that passes
    /// every tier is charged against all of them. Tiers sharing a key and window resolve to one
    /// counter, which is charged once per request.
    pub fn check_multiple_limits(&self, request: &RateLimitRequest, tiers: &[RateLimitTier]) -> RateLimitOutcome {
        let checks: Vec<_> = tiers
            .iter()
            .map(|tier| WindowCheck {
                key: record_key(tier, request),
                limit: tier.max_requests.get(),
                window: tier.window,
            })
            .collect();

        match self.storage.check_and_consume(&checks) {
            CheckResult::Allowed => RateLimitOutcome::admitted(),
            CheckResult::Rejected { index, resets_in } => {
                let tier = &tiers[index];
                let retry_after = retry_after_secs(resets_in, tier.window);

                log::debug!(
                    "Rate limit tier '{}' exceeded ({} per {:?}), retry after {retry_after}s",
                    tier.key,
                    tier.max_requests,
                    tier.window
                );

                RateLimitOutcome::rejected(tier.key, retry_after)
            }
        }
    }

    /// Remove counters whose window has expired.
    ///
    /// An expired counter is reset on its next check anyway, so this only reclaims memory.
    pub fn cleanup(&self) {
        let removed = self.storage.remove_expired();

        if removed > 0 {
            log::debug!("Rate limit cleanup removed {removed} expired counters, {} remain", self.storage.len());
        }
    }

    /// Forget every counter.
    pub fn reset(&self) {
        self.storage.clear();
    }

    /// Number of counters currently held.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether no counters are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_key(tier: &RateLimitTier, request: &RateLimitRequest) -> String {
    format!(
        "{}:{}:{}",
        tier.key,
        identity_key(tier.key, request),
        tier.window.as_nanos()
    )
}

/// Round the remaining window up to whole seconds, never below one or above the window itself.
fn retry_after_secs(resets_in: Duration, window: Duration) -> u64 {
    let millis = resets_in.as_millis();
    let secs = millis.div_ceil(1000).max(1);
    let window_secs = window.as_millis().div_ceil(1000).max(1);

    u64::try_from(secs.min(window_secs)).unwrap_or(u64::MAX)
}
