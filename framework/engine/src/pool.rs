use std::collections::BTreeSet;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use arena_core::prelude::{
    CancelListener, Capability, EventSender, RunId, RunInstance, RunStatus, ScenarioDefinition,
    StepContext, StepOutcome, StepResult,
};

/// The slot table is the only shared mutable structure in the pool. All mutation goes through
/// the single mutex here so a slot can never be assigned to two runs.
#[derive(Debug)]
pub struct SlotTable {
    slots: Mutex<Vec<Option<RunId>>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(vec![None; capacity]),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn occupied(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Claim the first free slot for a run, or None when the pool is saturated.
    pub fn acquire(&self, run_id: &RunId) -> Option<usize> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|slot| slot.is_none())?;
        slots[index] = Some(run_id.clone());
        Some(index)
    }

    /// Release a slot. Only the run that holds the slot may release it, so a forced
    /// reclamation racing a natural completion cannot double-free.
    pub fn release(&self, index: usize, run_id: &RunId) {
        let mut slots = self.slots.lock();
        match slots.get_mut(index) {
            Some(slot) if slot.as_ref() == Some(run_id) => *slot = None,
            Some(_) => {
                log::debug!("Slot {} is not held by run {}, ignoring release", index, run_id)
            }
            None => log::error!("Release of out-of-range slot {}", index),
        }
    }
}

/// A fixed-size pool of worker slots, each executing one run at a time.
#[derive(Debug)]
pub struct WorkerPool {
    capabilities: BTreeSet<Capability>,
    slot_table: SlotTable,
}

impl WorkerPool {
    pub fn new(capacity: usize, capabilities: BTreeSet<Capability>) -> Self {
        Self {
            capabilities,
            slot_table: SlotTable::new(capacity),
        }
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn slot_table(&self) -> &SlotTable {
        &self.slot_table
    }

    /// Capabilities the scenario requires but this pool does not offer.
    pub fn missing_capabilities(&self, scenario: &ScenarioDefinition) -> Vec<Capability> {
        scenario
            .required_capabilities
            .difference(&self.capabilities)
            .cloned()
            .collect()
    }
}

/// Execute the steps of one run sequentially, appending step results to the instance as they
/// are produced, and return the terminal status the run should take.
///
/// Step hooks run on a blocking thread raced against their timeout. A hook that outlives its
/// timeout is left to finish in the background and its result discarded; the step is recorded
/// as Timeout and the run aborts. A panicking hook is recorded as Failure. The cancel signal
/// is observed at step boundaries only.
pub(crate) async fn execute_run(
    scenario: Arc<ScenarioDefinition>,
    instance: Arc<RwLock<RunInstance>>,
    mut cancel: CancelListener,
    events: EventSender,
) -> RunStatus {
    let run_id = instance.read().run_id.clone();
    let seq = Arc::new(AtomicU64::new(0));

    let mut status = RunStatus::Completed;

    for step in &scenario.steps {
        if cancel.should_cancel() {
            log::info!("Run {} observed cancel before step {}", run_id, step.name);
            status = RunStatus::Cancelled;
            break;
        }

        let ctx = StepContext::new(run_id.clone(), step.id.clone(), seq.clone(), events.clone());
        ctx.emit("step_started", serde_json::json!({ "step": step.name }));

        let hook = step.run;
        let hook_ctx = ctx.clone();
        let outcome = tokio::time::timeout(
            step.timeout,
            tokio::task::spawn_blocking(move || hook(&hook_ctx)),
        )
        .await;

        let step_result = match outcome {
            Err(_elapsed) => {
                log::warn!(
                    "Step {} of run {} exceeded its timeout of {:?}",
                    step.name,
                    run_id,
                    step.timeout
                );
                StepResult::new(
                    step.id.clone(),
                    StepOutcome::Timeout,
                    serde_json::json!({ "timeout_ms": step.timeout.as_millis() as u64 }),
                )
            }
            Ok(Err(join_error)) => {
                // The hook panicked. The run fails but the slot stays usable.
                log::error!(
                    "Step {} of run {} crashed: {:?}",
                    step.name,
                    run_id,
                    join_error
                );
                StepResult::new(
                    step.id.clone(),
                    StepOutcome::Failure,
                    serde_json::json!({ "error": "step crashed" }),
                )
            }
            Ok(Ok(Ok(payload))) => StepResult::new(step.id.clone(), StepOutcome::Success, payload),
            Ok(Ok(Err(e))) => {
                log::info!("Step {} of run {} failed: {:?}", step.name, run_id, e);
                StepResult::new(
                    step.id.clone(),
                    StepOutcome::Failure,
                    serde_json::json!({ "error": e.to_string() }),
                )
            }
        };

        let step_outcome = step_result.outcome;
        ctx.emit(
            "step_finished",
            serde_json::json!({ "step": step.name, "outcome": step_outcome }),
        );
        instance.write().push_step_result(step_result);

        if step_outcome != StepOutcome::Success {
            status = RunStatus::Failed;
            break;
        }
    }

    status
}
