use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// ODA backend in use (`postgres` or `memory`).
    pub backend: &'static str,
    /// Whether the ODA is reachable.
    pub oda_healthy: bool,
}

/// GET /health -- returns service and ODA health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let oda_healthy = match state.oda.health_check().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "ODA health check failed");
            false
        }
    };

    let status = if oda_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        backend: state.oda.backend_name(),
        oda_healthy,
    })
}

/// Mount health check routes (root level, not under the API prefix).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
