//! Handlers for tracked-entity endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use lastseen_core::cadence::HistoryEntry;
use lastseen_core::diagnosis::Diagnosis;
use lastseen_core::entity::EntityMetadata;
use lastseen_core::snapshot::{EntityFilter, EntitySnapshot};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest history page a client may request.
const MAX_HISTORY_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterEntityRequest {
    pub entity_id: String,
    #[serde(default)]
    pub metadata: Option<EntityMetadata>,
}

#[derive(Debug, Serialize)]
pub struct RegisterEntityResponse {
    pub entity_id: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub reset_count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /entities?area=&label=&domain=&health=
///
/// Entries of the latest snapshot, ordered by entity id.
pub async fn list_entities(
    State(state): State<AppState>,
    Query(filter): Query<EntityFilter>,
) -> Json<DataResponse<Vec<EntitySnapshot>>> {
    let entities = state.monitor.entities(&filter).await;
    Json(DataResponse { data: entities })
}

/// POST /entities
///
/// Start tracking an entity (or refresh its metadata).
pub async fn register_entity(
    State(state): State<AppState>,
    Json(body): Json<RegisterEntityRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<RegisterEntityResponse>>)> {
    let created = state.monitor.register(&body.entity_id, body.metadata).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(DataResponse {
            data: RegisterEntityResponse {
                entity_id: body.entity_id,
                created,
            },
        }),
    ))
}

/// GET /entities/{id}
pub async fn get_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> AppResult<Json<DataResponse<EntitySnapshot>>> {
    let entity = state.monitor.entity(&entity_id).await?;
    Ok(Json(DataResponse { data: entity }))
}

/// DELETE /entities/{id}
pub async fn remove_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> AppResult<StatusCode> {
    state.monitor.remove(&entity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /entities/{id}/diagnosis
pub async fn get_diagnosis(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> AppResult<Json<DataResponse<Diagnosis>>> {
    let diagnosis = state.monitor.diagnose(&entity_id).await?;
    Ok(Json(DataResponse { data: diagnosis }))
}

/// GET /entities/{id}/history?limit=
///
/// Most recent intervals, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<DataResponse<Vec<HistoryEntry>>>> {
    if let Some(limit) = query.limit {
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }
    }
    let history = state.monitor.history(&entity_id, query.limit).await?;
    Ok(Json(DataResponse { data: history }))
}

/// POST /entities/{id}/reset
///
/// Discard the entity's learned cadence.
pub async fn reset_entity(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> AppResult<Json<DataResponse<ResetResponse>>> {
    let reset_count = state.monitor.reset_learning(Some(&entity_id)).await?;
    Ok(Json(DataResponse {
        data: ResetResponse { reset_count },
    }))
}
