use axum::routing::get;
use axum::Router;

use crate::handlers::mode;
use crate::state::AppState;

/// Mode routes mounted at `/mode`.
///
/// ```text
/// GET /    -> get_mode
/// PUT /    -> set_mode
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(mode::get_mode).put(mode::set_mode))
}
