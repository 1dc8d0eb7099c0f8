//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics, MetricsSnapshot};
use tracing::warn;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
///
/// Probes postgres on every call so the report reflects the current pool.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    if state.store.check_connection().await {
        health().postgres.set_healthy();
    } else {
        warn!("PostgreSQL connection check failed");
        health().postgres.set_unhealthy("connection check failed");
    }

    let report = health().report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        postgres_connected: health().postgres.is_healthy(),
        active_runs: metrics().active_runs.get(),
        components: report.components,
    })
}

/// GET /health/ready - Readiness probe (postgres reachable).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics - In-process counters.
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
