use crate::observability::{HealthChecker, MetricsRecorder};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

/// GET /health/live - Liveness probe
#[tracing::instrument(skip(health_checker))]
pub async fn liveness(State(health_checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    Json(health_checker.liveness().await)
}

/// GET /health/ready - Readiness probe
#[tracing::instrument(skip(health_checker))]
pub async fn readiness(State(health_checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let status = health_checker.readiness().await;

    if status.is_ok() {
        (StatusCode::OK, Json(status))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(status))
    }
}

/// GET /metrics - Prometheus metrics
pub async fn metrics() -> Result<String, StatusCode> {
    MetricsRecorder::export().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
