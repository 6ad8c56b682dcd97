use std::time::Duration;

use serde::{Deserialize, Serialize};

use arena_core::prelude::{ArenaError, RunId, ScenarioDefinition, ScenarioDefinitionBuilder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRunRequest {
    pub scenario_id: String,
    pub requester: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRunResponse {
    pub run_id: RunId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRunResponse {
    pub run_id: RunId,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A scenario published over the API. Steps carry no executable hooks, they are backed by the
/// built-in simulated action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishScenarioRequest {
    pub id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    pub steps: Vec<PublishStepRequest>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishStepRequest {
    pub name: String,
    pub timeout_ms: u64,
}

impl PublishScenarioRequest {
    pub fn into_definition(self) -> Result<ScenarioDefinition, ArenaError> {
        if self.id.trim().is_empty() {
            return Err(ArenaError::InvalidRequest(
                "scenario id must not be empty".to_string(),
            ));
        }
        if self.steps.iter().any(|step| step.timeout_ms == 0) {
            return Err(ArenaError::InvalidRequest(
                "step timeout must be positive".to_string(),
            ));
        }

        let mut builder = ScenarioDefinitionBuilder::new(&self.id, &self.name)
            .with_version(self.version)
            .with_description(&self.description);
        for capability in &self.required_capabilities {
            builder = builder.require_capability(capability);
        }
        for step in &self.steps {
            builder = builder.use_simulated_step(&step.name, Duration::from_millis(step.timeout_ms));
        }

        builder
            .build()
            .map_err(|e| ArenaError::InvalidRequest(e.to_string()))
    }
}
