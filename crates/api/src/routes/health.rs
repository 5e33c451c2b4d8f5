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
    /// Mode the monitor is operating in.
    pub mode: &'static str,
    /// Number of entities currently tracked.
    pub tracked_entities: usize,
}

/// GET /health -- returns service status and a one-line view of the monitor.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let tracked_entities = state.monitor.tracked_count().await;

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.monitor.mode().as_str(),
        tracked_entities,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
