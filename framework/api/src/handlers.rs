//! HTTP request handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use arena_core::prelude::{ArenaError, RunId, RunRequest, ScenarioId};

use crate::state::ApiState;
use crate::types::*;

/// Wraps [ArenaError] so the status mapping lives in exactly one place.
#[derive(Debug)]
pub struct ApiError(ArenaError);

impl From<ArenaError> for ApiError {
    fn from(e: ArenaError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ArenaError::ScenarioNotFound(_) | ArenaError::RunNotFound(_) => StatusCode::NOT_FOUND,
            ArenaError::Conflict(_) | ArenaError::AlreadyTerminal(_) => StatusCode::CONFLICT,
            ArenaError::Backpressure | ArenaError::RequesterAtCapacity { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ArenaError::CapabilityMismatch(_) | ArenaError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ArenaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler for `GET /health`.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Handler for `GET /metrics` - engine counters as JSON.
pub async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.engine.counters())
}

/// Handler for `POST /runs` - submit a run.
///
/// Returns 202 Accepted with the run id. Clients poll `GET /runs/{run_id}` for progress.
pub async fn submit_run_handler(
    State(state): State<ApiState>,
    Json(request): Json<SubmitRunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let run_request = RunRequest::new(ScenarioId::new(request.scenario_id), request.requester);
    let run_id = state.engine.submit(run_request)?;
    log::info!("Accepted run {}", run_id);
    Ok((StatusCode::ACCEPTED, Json(SubmitRunResponse { run_id })))
}

/// Handler for `GET /runs/{run_id}` - run snapshot.
pub async fn get_run_handler(
    State(state): State<ApiState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.engine.run_status(&RunId::new(run_id))?;
    Ok(Json(snapshot))
}

/// Handler for `POST /runs/{run_id}/cancel`.
pub async fn cancel_run_handler(
    State(state): State<ApiState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::new(run_id);
    state.engine.cancel(&run_id).await?;
    Ok(Json(CancelRunResponse {
        run_id,
        status: "accepted".to_string(),
    }))
}

/// Handler for `GET /runs/{run_id}/events` - ordered events for a run.
pub async fn run_events_handler(
    State(state): State<ApiState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let events = state.engine.run_events(&RunId::new(run_id))?;
    Ok(Json(events))
}

/// Handler for `POST /scenarios` - publish a simulated scenario.
pub async fn publish_scenario_handler(
    State(state): State<ApiState>,
    Json(request): Json<PublishScenarioRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let definition = request.into_definition()?;
    let summary = definition.summary();
    state.engine.publish_scenario(definition)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Handler for `GET /scenarios` - list published scenarios.
pub async fn list_scenarios_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.engine.scenarios())
}

/// Handler for `GET /scenarios/{scenario_id}`.
pub async fn get_scenario_handler(
    State(state): State<ApiState>,
    Path(scenario_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.engine.scenario(&ScenarioId::new(scenario_id))?;
    Ok(Json(summary))
}
