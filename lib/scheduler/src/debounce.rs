//! Keyed trailing-edge debouncing.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug)]
struct Pending {
    generation: u64,
    wake: CancellationToken,
}

#[derive(Debug)]
struct State<K> {
    next_generation: u64,
    pending: HashMap<K, Pending>,
}

/// Collapses bursts of events per key into a single callback.
///
/// Each call to [`Debouncer::debounce`] restarts the key's timer and
/// replaces its callback. Only the callback registered last runs, once, after
/// `delay` has passed without another call for the same key.
#[derive(Debug)]
pub struct Debouncer<K> {
    state: Arc<Mutex<State<K>>>,
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K> Default for Debouncer<K> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_generation: 0,
                pending: HashMap::new(),
            })),
        }
    }
}

fn lock<K>(state: &Mutex<State<K>>) -> MutexGuard<'_, State<K>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Creates an idle debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `callback` for `key`, superseding any pending one.
    pub fn debounce<F, Fut>(&self, key: K, delay: Duration, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = sidekick_core::Result<()>> + Send + 'static,
    {
        let wake = CancellationToken::new();
        let generation = {
            let mut state = lock(&self.state);
            let generation = state.next_generation;
            state.next_generation += 1;
            let previous = state.pending.insert(
                key.clone(),
                Pending {
                    generation,
                    wake: wake.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.wake.cancel();
            }
            generation
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = wake.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            {
                let mut state = lock(&state);
                match state.pending.get(&key) {
                    Some(pending) if pending.generation == generation => {
                        state.pending.remove(&key);
                    }
                    _ => return,
                }
            }
            if let Err(e) = callback().await {
                warn!(error = %e, "debounced callback failed");
            }
        });
    }

    /// Drops the pending callback for `key`, if any.
    pub fn cancel(&self, key: &K) -> bool {
        let removed = lock(&self.state).pending.remove(key);
        removed.map(|pending| pending.wake.cancel()).is_some()
    }

    /// Number of keys with a callback waiting.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }
}
