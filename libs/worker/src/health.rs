//! Health and metrics endpoints for liveness/readiness probes.

use crate::inflight::InFlightCounter;
use crate::metrics;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Shared state for the health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub service: String,
    pub provider: String,
    pub listeners: usize,
    pub in_flight: Arc<InFlightCounter>,
}

/// Liveness: the process is up.
pub async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "ok",
        "service": state.service,
        "provider": state.provider,
    }))
}

/// Readiness: listeners are running.
pub async fn ready_handler(State(state): State<HealthState>) -> impl IntoResponse {
    if state.listeners > 0 {
        (StatusCode::OK, axum::Json(json!({"ready": true}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({"ready": false})),
        )
            .into_response()
    }
}

/// Operator view of the in-flight counter and listener fan-out.
pub async fn status_handler(State(state): State<HealthState>) -> impl IntoResponse {
    axum::Json(json!({
        "service": state.service,
        "provider": state.provider,
        "listeners": state.listeners,
        "in_flight": state.in_flight.count(),
        "in_flight_capacity": state.in_flight.capacity(),
    }))
}

/// Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::get_metrics_handle() {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not initialized".to_string(),
        )
            .into_response(),
    }
}

/// Router exposing `/healthz`, `/readyz`, `/status` and `/metrics`.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve the health router on `port`, in the background.
pub async fn serve_health(port: u16, state: HealthState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Health endpoints listening");
    axum::serve(listener, health_router(state))
        .await
        .map_err(std::io::Error::other)
}
