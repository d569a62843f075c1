//! In-flight deduplication of identical synthesis calls.

use std::{future::Future, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tokio::sync::oneshot;

use crate::provider::SynthesisError;

/// A pending synthesis that any number of callers can await.
pub type SharedSynthesis<T> = Shared<BoxFuture<'static, Result<T, SynthesisError>>>;

/// Registry of syntheses currently running, keyed by content fingerprint.
///
/// At most one synthesis runs per fingerprint. The entry is removed as soon as the synthesis
/// settles, so results are never cached beyond the lifetime of the call itself.
pub struct InFlight<T> {
    entries: Arc<DashMap<String, SharedSynthesis<T>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the synthesis running for `fingerprint`, or start one with `start`.
    ///
    /// The lookup and the registration happen under the same map entry lock, so two callers can
    /// never both start work for one fingerprint. `start` is called after that lock is released and
    /// may use this registry. The started future runs on its own task: dropping any waiter,
    /// including the one that started it, does not cancel it. Every waiter observes the same result
    /// or the same error.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_or_start<F, Fut>(&self, fingerprint: &str, start: F) -> SharedSynthesis<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SynthesisError>> + Send + 'static,
    {
        let (sender, shared) = match self.entries.entry(fingerprint.to_string()) {
            Entry::Occupied(entry) => {
                log::debug!("Joining in-flight synthesis {fingerprint}");
                return entry.get().clone();
            }
            Entry::Vacant(entry) => {
                let (sender, receiver) = oneshot::channel();

                let shared = async move {
                    match receiver.await {
                        Ok(result) => result,
                        Err(_) => {
                            log::error!("Synthesis task ended without a result");
                            Err(SynthesisError::Internal("synthesis task failed".to_string()))
                        }
                    }
                }
                .boxed()
                .shared();

                entry.insert(shared.clone());

                (sender, shared)
            }
        };

        log::debug!("Starting synthesis {fingerprint}");

        // Dropping the guard on any path, including a panic in `start`, unregisters the entry.
        let guard = RemoveOnDrop {
            entries: Arc::clone(&self.entries),
            fingerprint: fingerprint.to_string(),
        };

        let operation = start();

        tokio::spawn(async move {
            let result = operation.await;

            // Unregister before waking waiters, so a caller that has seen the result starts afresh.
            drop(guard);
            let _ = sender.send(result);
        });

        shared
    }

    /// Whether a synthesis for `fingerprint` is currently running.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }

    /// Number of syntheses currently running.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is running.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes the registry entry when the synthesis settles, panics or is aborted.
struct RemoveOnDrop<T> {
    entries: Arc<DashMap<String, SharedSynthesis<T>>>,
    fingerprint: String,
}

impl<T> Drop for RemoveOnDrop<T> {
    fn drop(&mut self) {
        self.entries.remove(&self.fingerprint);
        log::debug!("Synthesis {} settled", self.fingerprint);
    }
}
