use axum::routing::get;
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// Configuration routes mounted at `/config`.
///
/// ```text
/// GET /    -> get_config
/// PUT /    -> update_config
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(settings::get_config).put(settings::update_config),
    )
}
