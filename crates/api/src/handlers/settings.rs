//! Handlers for engine configuration.

use axum::extract::State;
use axum::Json;
use lastseen_core::config::MonitorConfig;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /config
pub async fn get_config(State(state): State<AppState>) -> Json<DataResponse<MonitorConfig>> {
    Json(DataResponse {
        data: state.monitor.config().await,
    })
}

/// PUT /config
///
/// Replace the configuration. Omitted fields take their defaults; out of
/// range values are rejected and the current configuration is kept.
pub async fn update_config(
    State(state): State<AppState>,
    Json(config): Json<MonitorConfig>,
) -> AppResult<Json<DataResponse<MonitorConfig>>> {
    let config = state.monitor.update_config(config).await?;
    Ok(Json(DataResponse { data: config }))
}
