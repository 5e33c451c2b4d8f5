//! Handlers for data maintenance.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::entities::ResetResponse;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ResetLearningRequest {
    /// Reset one entity; all entities when absent.
    #[serde(default)]
    pub entity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    /// Every entity id the host still knows about.
    pub valid_entity_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed_count: usize,
    pub removed: Vec<String>,
}

/// POST /maintenance/reset-learning
pub async fn reset_learning(
    State(state): State<AppState>,
    Json(body): Json<ResetLearningRequest>,
) -> AppResult<Json<DataResponse<ResetResponse>>> {
    let reset_count = state
        .monitor
        .reset_learning(body.entity_id.as_deref())
        .await?;
    Ok(Json(DataResponse {
        data: ResetResponse { reset_count },
    }))
}

/// POST /maintenance/cleanup
///
/// Drop tracked entities the host no longer knows.
pub async fn cleanup_orphans(
    State(state): State<AppState>,
    Json(body): Json<CleanupRequest>,
) -> Json<DataResponse<CleanupResponse>> {
    let removed = state.monitor.cleanup_orphans(&body.valid_entity_ids).await;
    Json(DataResponse {
        data: CleanupResponse {
            removed_count: removed.len(),
            removed,
        },
    })
}
