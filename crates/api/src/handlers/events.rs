//! Handlers for the inbound event feed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use lastseen_monitor::IngestOutcome;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest batch accepted in one request.
const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Absent when the event carried no usable id.
    pub entity_id: Option<String>,
    pub outcome: IngestOutcome,
}

/// Per-outcome totals for a batch.
#[derive(Debug, Default, Serialize)]
pub struct BatchIngestResponse {
    pub first: usize,
    pub accepted: usize,
    pub ignored: usize,
    pub rejected: usize,
}

/// POST /events
///
/// Feed one activity event. Malformed events are reported in the outcome,
/// never as an error.
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(event): Json<Value>,
) -> (StatusCode, Json<DataResponse<IngestResponse>>) {
    let entity_id = event
        .get("entity_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    let outcome = state.monitor.ingest_json(event).await;
    (
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: IngestResponse { entity_id, outcome },
        }),
    )
}

/// POST /events/batch
///
/// Feed events in order. Each element is decoded on its own, so one
/// malformed event never discards the rest.
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(events): Json<Vec<Value>>,
) -> AppResult<(StatusCode, Json<DataResponse<BatchIngestResponse>>)> {
    if events.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "batch must not exceed {MAX_BATCH_SIZE} events"
        )));
    }

    let mut totals = BatchIngestResponse::default();
    for event in events {
        match state.monitor.ingest_json(event).await {
            IngestOutcome::First => totals.first += 1,
            IngestOutcome::Accepted => totals.accepted += 1,
            IngestOutcome::Ignored => totals.ignored += 1,
            IngestOutcome::Rejected => totals.rejected += 1,
        }
    }
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: totals })))
}
