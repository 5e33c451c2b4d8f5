//! Route definitions for data maintenance.

use axum::routing::post;
use axum::Router;

use crate::handlers::maintenance;
use crate::state::AppState;

/// Maintenance routes mounted at `/maintenance`.
///
/// ```text
/// POST /reset-learning    -> reset_learning
/// POST /cleanup           -> cleanup_orphans
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reset-learning", post(maintenance::reset_learning))
        .route("/cleanup", post(maintenance::cleanup_orphans))
}
