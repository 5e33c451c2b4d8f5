//! Handlers for snapshots and on-demand evaluation.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use lastseen_core::health::HealthCounts;
use lastseen_core::snapshot::Snapshot;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /snapshot
///
/// The latest published snapshot.
pub async fn get_snapshot(State(state): State<AppState>) -> Json<DataResponse<Arc<Snapshot>>> {
    Json(DataResponse {
        data: state.monitor.snapshot().await,
    })
}

/// GET /summary
///
/// Aggregate health counts of the latest snapshot.
pub async fn get_summary(State(state): State<AppState>) -> Json<DataResponse<HealthCounts>> {
    Json(DataResponse {
        data: state.monitor.counts().await,
    })
}

/// POST /evaluation
///
/// Run a sweep now and return its snapshot.
pub async fn force_evaluation(State(state): State<AppState>) -> Json<DataResponse<Arc<Snapshot>>> {
    tracing::info!("Forced evaluation requested");
    Json(DataResponse {
        data: state.monitor.evaluate().await,
    })
}
