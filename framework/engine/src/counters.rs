use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-wide counters, served as JSON from the metrics endpoint.
#[derive(Debug, Default)]
pub struct EngineCounters {
    runs_submitted: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    runs_cancelled: AtomicU64,
    backpressure_rejections: AtomicU64,
    events_dropped: AtomicU64,
    store_write_failures: AtomicU64,
}

impl EngineCounters {
    pub fn incr_runs_submitted(&self) {
        self.runs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_runs_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_backpressure_rejections(&self) {
        self.backpressure_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_events_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_store_write_failures(&self) {
        self.store_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            runs_submitted: self.runs_submitted.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            backpressure_rejections: self.backpressure_rejections.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            store_write_failures: self.store_write_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub runs_submitted: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub runs_cancelled: u64,
    pub backpressure_rejections: u64,
    pub events_dropped: u64,
    pub store_write_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let counters = EngineCounters::default();
        counters.incr_runs_submitted();
        counters.incr_runs_submitted();
        counters.incr_events_dropped();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.runs_submitted, 2);
        assert_eq!(snapshot.events_dropped, 1);
        assert_eq!(snapshot.runs_failed, 0);
    }
}
