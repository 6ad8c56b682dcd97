use std::sync::Arc;

use arena_core::prelude::{
    ArenaError, RunEvent, RunId, RunInstance, RunRequest, ScenarioDefinition, ScenarioId,
    ScenarioSummary,
};

use crate::config::EngineConfig;
use crate::counters::{CountersSnapshot, EngineCounters};
use crate::events::EventAggregator;
use crate::pool::WorkerPool;
use crate::registry::ScenarioRegistry;
use crate::scheduler::Scheduler;
use crate::store::{MemoryResultStore, ResultStore};

/// Wires the registry, scheduler, worker pool, event aggregator and result store together and
/// is the single entry point the API layer talks to.
///
/// Must be constructed from within a Tokio runtime, the event intake task is spawned here.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<ScenarioRegistry>,
    scheduler: Scheduler,
    aggregator: EventAggregator,
    store: Arc<dyn ResultStore>,
    counters: Arc<EngineCounters>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryResultStore::new()))
    }

    pub fn with_store(config: EngineConfig, store: Arc<dyn ResultStore>) -> Self {
        let counters = Arc::new(EngineCounters::default());
        let registry = Arc::new(ScenarioRegistry::new());
        let aggregator = EventAggregator::new(counters.clone(), config.event_retention_runs);
        let events_tx = aggregator.start_intake();
        let pool = Arc::new(WorkerPool::new(config.slots, config.capabilities.clone()));

        let scheduler = Scheduler::new(
            config,
            registry.clone(),
            pool,
            store.clone(),
            aggregator.clone(),
            events_tx,
            counters.clone(),
        );

        Self {
            registry,
            scheduler,
            aggregator,
            store,
            counters,
        }
    }

    pub fn publish_scenario(&self, definition: ScenarioDefinition) -> Result<(), ArenaError> {
        self.registry.publish(definition)
    }

    pub fn scenario(&self, id: &ScenarioId) -> Result<ScenarioSummary, ArenaError> {
        Ok(self.registry.get(id)?.summary())
    }

    pub fn scenarios(&self) -> Vec<ScenarioSummary> {
        self.registry.list()
    }

    pub fn submit(&self, request: RunRequest) -> Result<RunId, ArenaError> {
        self.scheduler.submit(request)
    }

    pub fn run_status(&self, run_id: &RunId) -> Result<RunInstance, ArenaError> {
        self.scheduler.status(run_id)
    }

    pub async fn cancel(&self, run_id: &RunId) -> Result<(), ArenaError> {
        self.scheduler.cancel(run_id).await
    }

    /// Events recorded for a run, ordered by sequence number. Fails with NotFound for run ids
    /// the engine has never seen.
    pub fn run_events(&self, run_id: &RunId) -> Result<Vec<RunEvent>, ArenaError> {
        self.scheduler.status(run_id)?;
        Ok(self.aggregator.events_for_run(run_id))
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    /// Direct access to the result store, mainly for tests and alternative frontends.
    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }
}
