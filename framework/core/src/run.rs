use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InvalidTransition;
use crate::scenario::{ScenarioId, StepId};

/// Unique identifier for one execution attempt of a scenario.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(nanoid::nanoid!())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A request to execute a scenario, created at the API boundary and consumed by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub scenario_id: ScenarioId,
    pub requester: String,
    pub submitted_at: DateTime<Utc>,
}

impl RunRequest {
    pub fn new(scenario_id: ScenarioId, requester: impl Into<String>) -> Self {
        Self {
            scenario_id,
            requester: requester.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Status of a run. Transitions are monotonically forward and enforced by [RunStatus::advance].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    /// Compute the next status, rejecting skipped or reversed transitions.
    ///
    /// A queued run may be cancelled without ever running, so `Pending -> Cancelled` is the one
    /// permitted shortcut to a terminal state.
    pub fn advance(self, next: RunStatus) -> Result<RunStatus, InvalidTransition> {
        let allowed = matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Cancelled)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Cancelled)
        );

        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Failure,
    Timeout,
}

/// Outcome of one step within a run. Append-only once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub outcome: StepOutcome,
    pub recorded_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl StepResult {
    pub fn new(step_id: StepId, outcome: StepOutcome, payload: serde_json::Value) -> Self {
        Self {
            step_id,
            outcome,
            recorded_at: Utc::now(),
            payload,
        }
    }
}

/// One execution attempt of a scenario.
///
/// Owned exclusively by the scheduler until it reaches a terminal status, after which it is
/// handed to the result store and becomes immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInstance {
    pub run_id: RunId,
    pub scenario_id: ScenarioId,
    pub requester: String,
    pub status: RunStatus,
    pub slot: Option<usize>,
    pub step_results: Vec<StepResult>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunInstance {
    pub fn new(run_id: RunId, request: &RunRequest) -> Self {
        Self {
            run_id,
            scenario_id: request.scenario_id.clone(),
            requester: request.requester.clone(),
            status: RunStatus::Pending,
            slot: None,
            step_results: Vec::new(),
            created_at: request.submitted_at,
            finished_at: None,
        }
    }

    /// Move the run forward in its state machine, stamping `finished_at` on terminal states.
    pub fn advance(&mut self, next: RunStatus) -> Result<(), InvalidTransition> {
        self.status = self.status.advance(next)?;
        if self.status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn push_step_result(&mut self, result: StepResult) {
        self.step_results.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_request() -> RunRequest {
        RunRequest::new(ScenarioId::new("port-scan"), "red-team-lead")
    }

    #[test]
    fn generated_run_ids_are_unique() {
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn happy_path_transitions() {
        let mut run = RunInstance::new(RunId::generate(), &sample_request());
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.finished_at.is_none());

        run.advance(RunStatus::Running).unwrap();
        run.advance(RunStatus::Completed).unwrap();

        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn pending_may_be_cancelled_without_running() {
        let mut run = RunInstance::new(RunId::generate(), &sample_request());
        run.advance(RunStatus::Cancelled).unwrap();
        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[test]
    fn pending_cannot_skip_to_completed() {
        let err = RunStatus::Pending.advance(RunStatus::Completed).unwrap_err();
        assert_eq!(err.from, RunStatus::Pending);
        assert_eq!(err.to, RunStatus::Completed);
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [RunStatus::Completed, RunStatus::Failed, RunStatus::Cancelled] {
            assert!(terminal.advance(RunStatus::Running).is_err());
            assert!(terminal.advance(RunStatus::Pending).is_err());
            assert!(terminal.advance(RunStatus::Completed).is_err());
        }
    }

    #[test]
    fn running_cannot_reverse_to_pending() {
        assert!(RunStatus::Running.advance(RunStatus::Pending).is_err());
    }
}
