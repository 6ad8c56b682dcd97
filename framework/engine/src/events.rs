use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use arena_core::prelude::{EventSender, RunEvent, RunId};

use crate::counters::EngineCounters;

/// Collects structured events from workers and step hooks.
///
/// Events arrive unordered across runs and are stored keyed by (run id, sequence number), so
/// per-run retrieval is always in emission order. Events for run ids that were never
/// registered are dropped and counted rather than treated as an error.
#[derive(Debug, Clone)]
pub struct EventAggregator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    events: Mutex<BTreeMap<(RunId, u64), RunEvent>>,
    known_runs: Mutex<HashSet<RunId>>,
    finished: Mutex<VecDeque<RunId>>,
    retained_runs: usize,
    counters: Arc<EngineCounters>,
}

impl EventAggregator {
    pub fn new(counters: Arc<EngineCounters>, retained_runs: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                events: Mutex::new(BTreeMap::new()),
                known_runs: Mutex::new(HashSet::new()),
                finished: Mutex::new(VecDeque::new()),
                retained_runs,
                counters,
            }),
        }
    }

    /// Open the intake channel and spawn the task that drains it. Must be called from within a
    /// Tokio runtime.
    pub fn start_intake(&self) -> EventSender {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                inner.ingest(event);
            }
            log::debug!("Event intake channel closed");
        });
        tx
    }

    /// Make a run id known to the aggregator so its events are retained. Called by the
    /// scheduler when it accepts a run.
    pub fn register_run(&self, run_id: &RunId) {
        self.inner.known_runs.lock().insert(run_id.clone());
    }

    /// Ingest a single event directly, bypassing the channel. The intake task uses this; tests
    /// can too.
    pub fn ingest(&self, event: RunEvent) {
        self.inner.ingest(event);
    }

    /// Note that a run has been handed to the result store.
    ///
    /// Events for finished runs stay queryable, but only for the most recent `retained_runs`
    /// of them. Older finished runs have their events and registration evicted so a long-lived
    /// server does not accumulate event history without bound.
    pub fn mark_finished(&self, run_id: &RunId) {
        let evicted: Vec<RunId> = {
            let mut finished = self.inner.finished.lock();
            finished.push_back(run_id.clone());
            let excess = finished.len().saturating_sub(self.inner.retained_runs);
            finished.drain(..excess).collect()
        };

        if evicted.is_empty() {
            return;
        }
        {
            let mut known_runs = self.inner.known_runs.lock();
            for run in &evicted {
                known_runs.remove(run);
            }
        }
        let mut events = self.inner.events.lock();
        events.retain(|(run, _), _| !evicted.contains(run));
    }

    /// All events recorded for a run, ordered by sequence number.
    pub fn events_for_run(&self, run_id: &RunId) -> Vec<RunEvent> {
        let events = self.inner.events.lock();
        events
            .range((run_id.clone(), 0)..=(run_id.clone(), u64::MAX))
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Inner {
    fn ingest(&self, event: RunEvent) {
        if !self.known_runs.lock().contains(&event.run_id) {
            self.counters.incr_events_dropped();
            log::warn!(
                "Dropping event [{}] for unknown run {}",
                event.name,
                event.run_id
            );
            return;
        }

        // Events are immutable once recorded, a duplicate sequence number keeps the first.
        self.events
            .lock()
            .entry((event.run_id.clone(), event.seq))
            .or_insert(event);
    }
}
