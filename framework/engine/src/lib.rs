mod config;
mod counters;
mod engine;
mod events;
mod pool;
mod registry;
mod scheduler;
mod store;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::counters::{CountersSnapshot, EngineCounters};
    pub use crate::engine::Engine;
    pub use crate::events::EventAggregator;
    pub use crate::pool::WorkerPool;
    pub use crate::registry::ScenarioRegistry;
    pub use crate::scheduler::Scheduler;
    pub use crate::store::{persist_with_retry, MemoryResultStore, ResultStore, StoreError};
}
