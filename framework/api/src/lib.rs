//! HTTP API for the arena engine.
//!
//! The surface is small and fully typed:
//!
//! - `GET /health` - liveness probe
//! - `GET /metrics` - engine counters as JSON
//! - `POST /runs` - submit a run (202 Accepted with the run id)
//! - `GET /runs/{run_id}` - run snapshot
//! - `POST /runs/{run_id}/cancel` - cooperative cancellation
//! - `GET /runs/{run_id}/events` - ordered events for a run
//! - `GET /scenarios`, `POST /scenarios`, `GET /scenarios/{scenario_id}` - registry access
//!
//! Engine errors map onto statuses at one place: NotFound is 404, Conflict and
//! already-terminal are 409, backpressure is 503, validation problems are 400 and anything
//! internal is 500.

mod handlers;
mod routes;
mod server;
mod state;
mod types;

pub use routes::create_router;
pub use server::{ApiServer, ApiServerConfig, ApiServerError, ApiServerHandle};
pub use state::ApiState;
pub use types::*;
