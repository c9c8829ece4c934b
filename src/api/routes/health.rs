//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (every dataset polled once)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::routes::sources::dataset_statuses;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once every dataset has been polled at least once, whether or
/// not that poll succeeded.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.store.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with polling details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stale = dataset_statuses(&state.store)
        .iter()
        .filter(|d| d.last_error.is_some())
        .count();

    let status = if !state.store.is_ready() {
        "starting"
    } else if stale > 0 {
        "degraded"
    } else {
        "healthy"
    };

    let poller = if state.poller.is_running().await {
        "running"
    } else {
        "stopped"
    };

    Json(HealthResponse {
        status: status.to_string(),
        poller: poller.to_string(),
        stale_datasets: stale,
        revision: state.board.revision(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
