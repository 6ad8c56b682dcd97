use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::AbortHandle;

use arena_core::prelude::{
    ArenaError, CancelHandle, EventSender, RunId, RunInstance, RunRequest, RunStatus,
    ScenarioDefinition,
};

use crate::config::EngineConfig;
use crate::counters::EngineCounters;
use crate::events::EventAggregator;
use crate::pool::{self, WorkerPool};
use crate::registry::ScenarioRegistry;
use crate::store::{persist_with_retry, ResultStore};

/// Accepts run requests, assigns them to worker slots and owns every run until it reaches a
/// terminal status, at which point the run is handed to the result store.
///
/// Submission never blocks: a request either gets a slot, joins the bounded queue, or is
/// rejected with backpressure. Methods that start or finish runs must be called from within a
/// Tokio runtime.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

#[derive(Debug)]
struct SchedulerInner {
    config: EngineConfig,
    registry: Arc<ScenarioRegistry>,
    pool: Arc<WorkerPool>,
    store: Arc<dyn ResultStore>,
    aggregator: EventAggregator,
    events_tx: EventSender,
    counters: Arc<EngineCounters>,
    state: Mutex<SchedulerState>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    runs: HashMap<RunId, ActiveRun>,
    queue: VecDeque<RunId>,
    active_per_requester: HashMap<String, usize>,
}

#[derive(Debug)]
struct ActiveRun {
    instance: Arc<RwLock<RunInstance>>,
    scenario: Arc<ScenarioDefinition>,
    cancel: CancelHandle,
    abort: Option<AbortHandle>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        registry: Arc<ScenarioRegistry>,
        pool: Arc<WorkerPool>,
        store: Arc<dyn ResultStore>,
        aggregator: EventAggregator,
        events_tx: EventSender,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                registry,
                pool,
                store,
                aggregator,
                events_tx,
                counters,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Accept a run request, assigning a slot immediately or queueing the run.
    pub fn submit(&self, request: RunRequest) -> Result<RunId, ArenaError> {
        if request.requester.trim().is_empty() {
            return Err(ArenaError::InvalidRequest(
                "requester must not be empty".to_string(),
            ));
        }

        let scenario = self.inner.registry.get(&request.scenario_id)?;
        let missing = self.inner.pool.missing_capabilities(&scenario);
        if !missing.is_empty() {
            return Err(ArenaError::CapabilityMismatch(missing));
        }

        let run_id = RunId::generate();
        let inner = &self.inner;
        let mut state = inner.state.lock();

        let active = state
            .active_per_requester
            .get(&request.requester)
            .copied()
            .unwrap_or(0);
        if active >= inner.config.max_runs_per_requester {
            inner.counters.incr_backpressure_rejections();
            return Err(ArenaError::RequesterAtCapacity {
                requester: request.requester,
                active,
            });
        }

        let slot = inner.pool.slot_table().acquire(&run_id);
        if slot.is_none() && state.queue.len() >= inner.config.queue_capacity {
            inner.counters.incr_backpressure_rejections();
            return Err(ArenaError::Backpressure);
        }

        let instance = Arc::new(RwLock::new(RunInstance::new(run_id.clone(), &request)));
        state.runs.insert(
            run_id.clone(),
            ActiveRun {
                instance,
                scenario,
                cancel: CancelHandle::new(),
                abort: None,
            },
        );
        *state
            .active_per_requester
            .entry(request.requester.clone())
            .or_insert(0) += 1;
        inner.aggregator.register_run(&run_id);
        inner.counters.incr_runs_submitted();

        match slot {
            Some(slot) => inner.start_run(&mut state, run_id.clone(), slot),
            None => {
                state.queue.push_back(run_id.clone());
                log::debug!("Run {} queued ({} waiting)", run_id, state.queue.len());
            }
        }

        Ok(run_id)
    }

    /// Snapshot of a run, live from the scheduler or from the result store once terminal.
    pub fn status(&self, run_id: &RunId) -> Result<RunInstance, ArenaError> {
        if let Some(active) = self.inner.state.lock().runs.get(run_id) {
            return Ok(active.instance.read().clone());
        }
        self.inner
            .store
            .fetch(run_id)
            .ok_or_else(|| ArenaError::RunNotFound(run_id.clone()))
    }

    /// Request cancellation of a run.
    ///
    /// A queued run is cancelled immediately. A running run is signalled and given the
    /// configured grace period to stop at a step boundary before its slot is forcibly
    /// reclaimed.
    pub async fn cancel(&self, run_id: &RunId) -> Result<(), ArenaError> {
        let status = {
            let mut state = self.inner.state.lock();
            let status = match state.runs.get(run_id) {
                Some(active) => active.instance.read().status,
                None => {
                    return if self.inner.store.fetch(run_id).is_some() {
                        Err(ArenaError::AlreadyTerminal(run_id.clone()))
                    } else {
                        Err(ArenaError::RunNotFound(run_id.clone()))
                    };
                }
            };

            match status {
                RunStatus::Pending => {
                    state.queue.retain(|queued| queued != run_id);
                }
                RunStatus::Running => {
                    // Observed by the worker at the next step boundary, never preemptive.
                    if let Some(active) = state.runs.get(run_id) {
                        active.cancel.cancel();
                    }
                }
                _ => return Err(ArenaError::AlreadyTerminal(run_id.clone())),
            }
            status
        };

        match status {
            RunStatus::Pending => {
                self.inner.finish_run(run_id.clone(), RunStatus::Cancelled).await;
                Ok(())
            }
            _ => {
                let inner = self.inner.clone();
                let run_id = run_id.clone();
                let grace = self.inner.config.cancel_grace;
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    inner.reclaim_cancelled(run_id, grace).await;
                });
                Ok(())
            }
        }
    }
}

impl SchedulerInner {
    /// Mark a run Running on its slot and spawn the worker task. Expects the state lock to be
    /// held by the caller.
    fn start_run(self: &Arc<Self>, state: &mut SchedulerState, run_id: RunId, slot: usize) {
        let Some(active) = state.runs.get_mut(&run_id) else {
            self.pool.slot_table().release(slot, &run_id);
            return;
        };

        {
            let mut instance = active.instance.write();
            if let Err(e) = instance.advance(RunStatus::Running) {
                log::error!("Could not start run {}: {}", run_id, e);
                self.pool.slot_table().release(slot, &run_id);
                return;
            }
            instance.slot = Some(slot);
        }

        let scenario = active.scenario.clone();
        let instance = active.instance.clone();
        let cancel = active.cancel.new_listener();
        let events = self.events_tx.clone();
        let inner = self.clone();
        let task_run_id = run_id.clone();

        let task = tokio::spawn(async move {
            let status = pool::execute_run(scenario, instance, cancel, events).await;
            inner.finish_run(task_run_id, status).await;
        });
        active.abort = Some(task.abort_handle());

        log::debug!("Run {} assigned to slot {}", run_id, slot);
    }

    /// Take a run to its terminal status, release its slot, hand the terminal snapshot to the
    /// result store and dispatch any queued runs onto the freed slot.
    ///
    /// The run stays in the live map until the store write has been attempted, so a status
    /// query never sees a gap between the scheduler and the store.
    async fn finish_run(self: &Arc<Self>, run_id: RunId, status: RunStatus) {
        let Some((snapshot, _)) = self.settle(&run_id, status) else {
            // Already settled, a forced reclamation raced a natural completion.
            return;
        };
        self.record_and_persist(&run_id, &snapshot).await;
    }

    /// Forcibly settle a cancelled run that never observed the signal within the grace period,
    /// aborting its worker task and reclaiming its slot. No-op if the run settled on its own.
    async fn reclaim_cancelled(self: &Arc<Self>, run_id: RunId, grace: Duration) {
        let Some((snapshot, abort)) = self.settle(&run_id, RunStatus::Cancelled) else {
            return;
        };
        log::warn!(
            "Run {} did not observe cancel within {:?}, reclaiming its slot",
            run_id,
            grace
        );
        if let Some(abort) = abort {
            abort.abort();
        }
        self.record_and_persist(&run_id, &snapshot).await;
    }

    /// Under the state lock: move the run to its terminal status, release its slot, free its
    /// requester allowance and dispatch queued runs. Returns None when another caller settled
    /// the run first. The entry is left in the map for [SchedulerInner::record_and_persist].
    fn settle(
        self: &Arc<Self>,
        run_id: &RunId,
        status: RunStatus,
    ) -> Option<(RunInstance, Option<AbortHandle>)> {
        let mut state = self.state.lock();
        let active = state.runs.get_mut(run_id)?;
        if active.instance.read().status.is_terminal() {
            return None;
        }

        // Once the run is terminal the grace watchdog must not abort anything.
        let abort = active.abort.take();

        let slot = {
            let mut instance = active.instance.write();
            if let Err(e) = instance.advance(status) {
                log::error!("Invalid terminal transition for run {}: {}", run_id, e);
            }
            instance.slot.take()
        };
        if let Some(slot) = slot {
            self.pool.slot_table().release(slot, run_id);
        }

        let instance = active.instance.clone();
        let requester = instance.read().requester.clone();
        decrement_requester(&mut state, &requester);

        let snapshot = instance.read().clone();
        self.dispatch_queued(&mut state);
        Some((snapshot, abort))
    }

    async fn record_and_persist(self: &Arc<Self>, run_id: &RunId, snapshot: &RunInstance) {
        match snapshot.status {
            RunStatus::Completed => self.counters.incr_runs_completed(),
            RunStatus::Failed => self.counters.incr_runs_failed(),
            RunStatus::Cancelled => self.counters.incr_runs_cancelled(),
            other => log::error!("Run {} finished in non-terminal status {:?}", run_id, other),
        }

        // A run whose store write exhausted its retries stays in the live table, so its
        // outcome keeps answering status queries instead of vanishing into a 404.
        if self.persist_terminal(snapshot).await {
            self.state.lock().runs.remove(run_id);
            self.aggregator.mark_finished(run_id);
        }
    }

    /// Assign freed slots to queued runs, in submission order.
    fn dispatch_queued(self: &Arc<Self>, state: &mut SchedulerState) {
        while let Some(run_id) = state.queue.front().cloned() {
            let Some(slot) = self.pool.slot_table().acquire(&run_id) else {
                break;
            };
            state.queue.pop_front();
            self.start_run(state, run_id, slot);
        }
    }

    /// Returns whether the terminal snapshot made it into the result store.
    async fn persist_terminal(&self, snapshot: &RunInstance) -> bool {
        match persist_with_retry(
            self.store.as_ref(),
            snapshot,
            self.config.store_write_attempts,
            self.config.store_retry_base,
        )
        .await
        {
            Ok(()) => true,
            Err(e) => {
                self.counters.incr_store_write_failures();
                log::error!(
                    "Failed to persist terminal run {} after {} attempts: {}",
                    snapshot.run_id,
                    self.config.store_write_attempts,
                    e
                );
                false
            }
        }
    }
}

fn decrement_requester(state: &mut SchedulerState, requester: &str) {
    if let Some(count) = state.active_per_requester.get_mut(requester) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            state.active_per_requester.remove(requester);
        }
    }
}
