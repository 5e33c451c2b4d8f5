//! Handlers for operating-mode endpoints.

use axum::extract::State;
use axum::Json;
use lastseen_core::mode::ModePolicy;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

/// GET /mode
///
/// Active mode with the policy it carries.
pub async fn get_mode(State(state): State<AppState>) -> Json<DataResponse<ModePolicy>> {
    let multiplier = state.monitor.config().await.alert_threshold_multiplier;
    Json(DataResponse {
        data: ModePolicy::for_mode(state.monitor.mode(), multiplier),
    })
}

/// PUT /mode
///
/// Replace the active mode. Unknown mode names are rejected and the
/// previous mode stays active.
pub async fn set_mode(
    State(state): State<AppState>,
    Json(body): Json<SetModeRequest>,
) -> AppResult<Json<DataResponse<ModePolicy>>> {
    let mode = state.monitor.set_mode(&body.mode)?;
    let multiplier = state.monitor.config().await.alert_threshold_multiplier;
    Ok(Json(DataResponse {
        data: ModePolicy::for_mode(mode, multiplier),
    }))
}
