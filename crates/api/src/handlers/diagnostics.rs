//! Handlers for diagnostic export, storage statistics and recent alerts.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lastseen_events::MonitorEvent;
use lastseen_monitor::export::DataStats;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_ALERT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Export a single entity instead of the whole engine.
    pub entity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub limit: Option<usize>,
}

/// GET /diagnostics/export?entity_id=
pub async fn export_diagnostics(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    let response = match query.entity_id {
        Some(entity_id) => {
            let doc = state.monitor.export_entity(&entity_id).await?;
            Json(DataResponse { data: doc }).into_response()
        }
        None => Json(DataResponse {
            data: state.monitor.export().await,
        })
        .into_response(),
    };
    Ok(response)
}

/// GET /diagnostics/stats
pub async fn get_data_stats(State(state): State<AppState>) -> Json<DataResponse<DataStats>> {
    Json(DataResponse {
        data: state.monitor.data_stats().await,
    })
}

/// GET /alerts?limit=
///
/// Recently raised alerts, newest first.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> AppResult<Json<DataResponse<Vec<MonitorEvent>>>> {
    let limit = query.limit.unwrap_or(DEFAULT_ALERT_LIMIT);
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be positive".to_string()));
    }
    Ok(Json(DataResponse {
        data: state.alert_log.recent(limit).await,
    }))
}
