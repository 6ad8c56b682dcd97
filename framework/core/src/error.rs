use crate::run::{RunId, RunStatus};
use crate::scenario::{Capability, ScenarioId};

/// Errors surfaced to callers of the engine.
///
/// The API layer maps these onto HTTP status codes, so every variant here is part of the
/// external contract rather than an internal detail.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("scenario not found: {0}")]
    ScenarioNotFound(ScenarioId),

    #[error("run not found: {0}")]
    RunNotFound(RunId),

    #[error("scenario {0} is already published with different content")]
    Conflict(ScenarioId),

    #[error("scheduler queue is full, try again later")]
    Backpressure,

    #[error("requester {requester} already has {active} active runs")]
    RequesterAtCapacity { requester: String, active: usize },

    #[error("worker pool does not offer required capabilities: {0:?}")]
    CapabilityMismatch(Vec<Capability>),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("run {0} is already terminal")]
    AlreadyTerminal(RunId),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A run status transition that would skip or reverse the state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid run status transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: RunStatus,
    pub to: RunStatus,
}

impl From<InvalidTransition> for ArenaError {
    fn from(e: InvalidTransition) -> Self {
        ArenaError::Internal(e.to_string())
    }
}
