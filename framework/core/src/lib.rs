mod cancel;
mod error;
mod event;
mod run;
mod scenario;

pub mod prelude {
    pub use crate::cancel::{CancelHandle, CancelListener};
    pub use crate::error::{ArenaError, InvalidTransition};
    pub use crate::event::{EventSender, RunEvent, StepContext};
    pub use crate::run::{RunId, RunInstance, RunRequest, RunStatus, StepOutcome, StepResult};
    pub use crate::scenario::{
        Capability, ScenarioDefinition, ScenarioDefinitionBuilder, ScenarioId, ScenarioSummary,
        StepDefinition, StepFn, StepId, StepSummary,
    };
}
