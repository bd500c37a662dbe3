//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tally_core::CounterPolicy;
use tally_storage::{CounterStore, TimedStore};

/// Store handle shared by every route and the background sweep.
pub type SharedStore = Arc<dyn CounterStore>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Store with every call bounded by the policy's query timeout.
    pub store: SharedStore,
    pub policy: CounterPolicy,
    pub start_time: Instant,
}

impl AppState {
    /// Wrap `store` in a [`TimedStore`] using `policy.query_timeout`.
    pub fn new<S: CounterStore + 'static>(store: S, policy: CounterPolicy) -> Self {
        let timed = TimedStore::new(store, policy.query_timeout);
        Self {
            store: Arc::new(timed),
            policy,
            start_time: Instant::now(),
        }
    }

    /// Time since the state was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

crate::impl_from_ref!(SharedStore, store);
crate::impl_from_ref!(CounterPolicy, policy);
