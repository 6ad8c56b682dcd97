use std::collections::BTreeSet;
use std::time::Duration;

use arena_core::prelude::Capability;

/// Configuration for the engine, passed explicitly to [crate::engine::Engine::new].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of worker slots. Each slot executes at most one run at a time.
    pub slots: usize,
    /// Maximum number of accepted runs waiting for a slot. Submissions beyond this bound are
    /// rejected with backpressure rather than silently dropped.
    pub queue_capacity: usize,
    /// Maximum number of non-terminal runs a single requester may hold.
    pub max_runs_per_requester: usize,
    /// Capabilities offered by the worker pool. Scenarios requiring anything outside this set
    /// are rejected at submission.
    pub capabilities: BTreeSet<Capability>,
    /// How long a cancelled run is given to observe the signal at a step boundary before its
    /// slot is forcibly reclaimed.
    pub cancel_grace: Duration,
    /// Bounded retry for terminal result writes.
    pub store_write_attempts: u32,
    /// Backoff before the first result-write retry, doubled per attempt.
    pub store_retry_base: Duration,
    /// How many finished runs keep their events queryable before the oldest are evicted.
    pub event_retention_runs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slots: 4,
            queue_capacity: 32,
            max_runs_per_requester: 2,
            capabilities: ["network", "log-access"]
                .into_iter()
                .map(Capability::new)
                .collect(),
            cancel_grace: Duration::from_secs(5),
            store_write_attempts: 3,
            store_retry_base: Duration::from_millis(100),
            event_retention_runs: 256,
        }
    }
}
