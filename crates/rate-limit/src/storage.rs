//! In-memory fixed-window counter storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// One counter per `(tier key, identity, window)` combination.
#[derive(Debug, Clone, Copy)]
struct CounterRecord {
    count: u32,
    window_start: Instant,
    window: Duration,
}

impl CounterRecord {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_start: now,
            window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window
    }

    fn resets_in(&self, now: Instant) -> Duration {
        (self.window_start + self.window).saturating_duration_since(now)
    }
}

/// A single counter to check as part of one admission decision.
#[derive(Debug)]
pub(crate) struct WindowCheck {
    pub key: String,
    pub limit: u32,
    pub window: Duration,
}

/// Result of checking a group of counters.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CheckResult {
    /// Every counter had capacity and was charged one request.
    Allowed,
    /// The counter at `index` is exhausted; nothing was charged.
    Rejected { index: usize, resets_in: Duration },
}

/// In-memory storage for fixed-window counters.
#[derive(Debug, Default)]
pub(crate) struct InMemoryStorage {
    records: Mutex<HashMap<String, CounterRecord>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every counter in order and charge all of them only if none is exhausted.
    ///
    /// The whole group is evaluated under one lock, so concurrent callers never both take the last slot.
    pub fn check_and_consume(&self, checks: &[WindowCheck]) -> CheckResult {
        let now = Instant::now();
        let mut records = self.lock();

        for (index, check) in checks.iter().enumerate() {
            let record = records
                .entry(check.key.clone())
                .or_insert_with(|| CounterRecord::new(now, check.window));

            if record.is_expired(now) {
                log::debug!("Window expired for key '{}', starting a new one", check.key);
                *record = CounterRecord::new(now, check.window);
            }

            if record.count >= check.limit {
                let resets_in = record.resets_in(now);

                log::debug!(
                    "Request blocked for key '{}' - {} of {} used, window resets in {resets_in:?}",
                    check.key,
                    record.count,
                    check.limit
                );

                return CheckResult::Rejected { index, resets_in };
            }
        }

        let mut charged: Vec<&str> = Vec::with_capacity(checks.len());

        for check in checks {
            // Tiers resolving to the same counter are charged once.
            if charged.contains(&check.key.as_str()) {
                continue;
            }

            if let Some(record) = records.get_mut(&check.key) {
                record.count += 1;
                log::debug!("Request allowed for key '{}' - {} of {} used", check.key, record.count, check.limit);
            }

            charged.push(&check.key);
        }

        CheckResult::Allowed
    }

    /// Remove every counter whose window has run out, returning how many were removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.lock();

        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));

        before - records.len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CounterRecord>> {
        // No operation leaves the map half-updated, so a poisoned lock is still consistent.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
