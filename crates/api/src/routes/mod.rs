pub mod diagnostics;
pub mod entities;
pub mod events;
pub mod health;
pub mod maintenance;
pub mod mode;
pub mod settings;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /events                                  ingest one event (POST)
/// /events/batch                            ingest many events (POST)
///
/// /entities                                list (filters), register
/// /entities/{id}                           get, remove
/// /entities/{id}/diagnosis                 diagnosis (GET)
/// /entities/{id}/history                   interval history (GET)
/// /entities/{id}/reset                     reset learning (POST)
///
/// /summary                                 health counts (GET)
/// /snapshot                                latest snapshot (GET)
/// /evaluation                              force a sweep (POST)
///
/// /mode                                    get, set
/// /config                                  get, update
///
/// /maintenance/reset-learning              reset one or all (POST)
/// /maintenance/cleanup                     drop orphaned entities (POST)
///
/// /diagnostics/export                      export document (GET)
/// /diagnostics/stats                       storage statistics (GET)
///
/// /alerts                                  recent alerts (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/events", events::router())
        .nest("/entities", entities::router())
        // Snapshot views and on-demand sweeps.
        .route("/summary", get(handlers::evaluation::get_summary))
        .route("/snapshot", get(handlers::evaluation::get_snapshot))
        .route("/evaluation", post(handlers::evaluation::force_evaluation))
        .nest("/mode", mode::router())
        .nest("/config", settings::router())
        .nest("/maintenance", maintenance::router())
        .nest("/diagnostics", diagnostics::router())
        .route("/alerts", get(handlers::diagnostics::list_alerts))
}
