use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::run::RunId;
use crate::scenario::StepId;

/// A structured event emitted while a run executes.
///
/// Events arrive at the aggregator in no particular order across runs. The `seq` number is
/// assigned from a per-run counter so that the aggregator can order events within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub step_id: Option<StepId>,
    pub seq: u64,
    pub name: String,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

pub type EventSender = mpsc::UnboundedSender<RunEvent>;

/// Handed to step hooks so they can emit events and see which run and step they belong to.
///
/// Cloning is cheap and the clone shares the run's sequence counter, so events emitted from a
/// step and events emitted by the worker around it interleave with consistent ordering.
#[derive(Debug, Clone)]
pub struct StepContext {
    run_id: RunId,
    step_id: StepId,
    seq: Arc<AtomicU64>,
    events: EventSender,
}

impl StepContext {
    pub fn new(run_id: RunId, step_id: StepId, seq: Arc<AtomicU64>, events: EventSender) -> Self {
        Self {
            run_id,
            step_id,
            seq,
            events,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn step_id(&self) -> &StepId {
        &self.step_id
    }

    /// Emit a structured event tagged with this run and step.
    pub fn emit(&self, name: &str, payload: serde_json::Value) {
        let event = RunEvent {
            run_id: self.run_id.clone(),
            step_id: Some(self.step_id.clone()),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            payload,
            recorded_at: Utc::now(),
        };

        if self.events.send(event).is_err() {
            log::debug!(
                "Event aggregator has gone away, dropping event from run {}",
                self.run_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_carry_increasing_seq() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let seq = Arc::new(AtomicU64::new(0));
        let ctx = StepContext::new(
            RunId::generate(),
            StepId::new("probe"),
            seq.clone(),
            tx,
        );

        ctx.emit("started", serde_json::json!({}));
        ctx.emit("finished", serde_json::json!({"ok": true}));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert_eq!(second.name, "finished");
        assert_eq!(seq.load(Ordering::SeqCst), 2);
    }
}
