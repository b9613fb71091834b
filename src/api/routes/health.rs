//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (source answers a connection test)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the active source passes its connection test.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.source.test_connection().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status. Always 200; a failing source reports `degraded`.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connection = state.source.test_connection().await;

    let (status, source_status, source_error) = match connection {
        Ok(_) => ("healthy", "ok", None),
        Err(e) => ("degraded", "error", Some(e.to_string())),
    };

    Json(HealthResponse {
        status: status.to_string(),
        source: state.source.kind().to_string(),
        source_status: source_status.to_string(),
        source_error,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
