//! Route configuration for the HTTP API.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::ApiState;

/// Create the full router with every API route.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/runs", post(submit_run_handler))
        .route("/runs/{run_id}", get(get_run_handler))
        .route("/runs/{run_id}/cancel", post(cancel_run_handler))
        .route("/runs/{run_id}/events", get(run_events_handler))
        .route(
            "/scenarios",
            get(list_scenarios_handler).post(publish_scenario_handler),
        )
        .route("/scenarios/{scenario_id}", get(get_scenario_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use arena_core::prelude::{RunInstance, RunStatus};
    use arena_engine::prelude::{Engine, EngineConfig};

    use crate::types::SubmitRunResponse;

    fn test_state() -> ApiState {
        ApiState::new(Arc::new(Engine::new(EngineConfig::default())))
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn publish_body() -> serde_json::Value {
        serde_json::json!({
            "id": "phishing-drill",
            "name": "Phishing drill",
            "required_capabilities": ["network"],
            "steps": [
                { "name": "craft", "timeout_ms": 1000 },
                { "name": "send", "timeout_ms": 1000 }
            ]
        })
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = create_router(test_state());
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_returns_counter_snapshot() {
        let app = create_router(test_state());
        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["runs_submitted"], 0);
    }

    #[tokio::test]
    async fn submitting_against_unknown_scenario_is_404() {
        let app = create_router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/runs",
                serde_json::json!({ "scenario_id": "ghost", "requester": "alice" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_run_is_404_and_cancel_matches() {
        let state = test_state();

        let response = create_router(state.clone())
            .oneshot(get_request("/runs/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = create_router(state)
            .oneshot(json_request(
                "POST",
                "/runs/missing/cancel",
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn publish_then_submit_runs_to_completion() {
        let state = test_state();

        let response = create_router(state.clone())
            .oneshot(json_request("POST", "/scenarios", publish_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = create_router(state.clone())
            .oneshot(json_request(
                "POST",
                "/runs",
                serde_json::json!({ "scenario_id": "phishing-drill", "requester": "alice" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let submitted: SubmitRunResponse =
            serde_json::from_value(body_json(response).await).unwrap();

        // Poll the snapshot endpoint until the simulated steps finish.
        let mut terminal = None;
        for _ in 0..100 {
            let response = create_router(state.clone())
                .oneshot(get_request(&format!("/runs/{}", submitted.run_id)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let snapshot: RunInstance =
                serde_json::from_value(body_json(response).await).unwrap();
            if snapshot.status.is_terminal() {
                terminal = Some(snapshot);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let snapshot = terminal.expect("run did not finish in time");
        assert_eq!(snapshot.status, RunStatus::Completed);
        assert_eq!(snapshot.step_results.len(), 2);

        // Cancelling a terminal run is a conflict.
        let response = create_router(state)
            .oneshot(json_request(
                "POST",
                &format!("/runs/{}/cancel", submitted.run_id),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn republishing_divergent_content_is_409() {
        let state = test_state();

        let response = create_router(state.clone())
            .oneshot(json_request("POST", "/scenarios", publish_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let mut divergent = publish_body();
        divergent["steps"][0]["timeout_ms"] = serde_json::json!(9999);
        let response = create_router(state)
            .oneshot(json_request("POST", "/scenarios", divergent))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn scenarios_can_be_listed_and_fetched() {
        let state = test_state();
        create_router(state.clone())
            .oneshot(json_request("POST", "/scenarios", publish_body()))
            .await
            .unwrap();

        let response = create_router(state.clone())
            .oneshot(get_request("/scenarios"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list = body_json(response).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let response = create_router(state)
            .oneshot(get_request("/scenarios/phishing-drill"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["id"], "phishing-drill");
        assert_eq!(summary["steps"][0]["name"], "craft");
    }

    #[tokio::test]
    async fn capability_mismatch_is_400() {
        let state = ApiState::new(Arc::new(Engine::new(EngineConfig {
            capabilities: Default::default(),
            ..EngineConfig::default()
        })));

        create_router(state.clone())
            .oneshot(json_request("POST", "/scenarios", publish_body()))
            .await
            .unwrap();

        let response = create_router(state)
            .oneshot(json_request(
                "POST",
                "/runs",
                serde_json::json!({ "scenario_id": "phishing-drill", "requester": "alice" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
