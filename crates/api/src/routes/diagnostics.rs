//! Route definitions for diagnostic export and storage statistics.

use axum::routing::get;
use axum::Router;

use crate::handlers::diagnostics;
use crate::state::AppState;

/// Diagnostics routes mounted at `/diagnostics`.
///
/// ```text
/// GET /export    -> export_diagnostics
/// GET /stats     -> get_data_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export", get(diagnostics::export_diagnostics))
        .route("/stats", get(diagnostics::get_data_stats))
}
