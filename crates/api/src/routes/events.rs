//! Route definitions for the inbound event feed.

use axum::routing::post;
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;

/// Event routes mounted at `/events`.
///
/// ```text
/// POST /         -> ingest_event
/// POST /batch    -> ingest_batch
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(events::ingest_event))
        .route("/batch", post(events::ingest_batch))
}
