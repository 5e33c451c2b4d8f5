//! Route definitions for tracked entities.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::entities;
use crate::state::AppState;

/// Entity routes mounted at `/entities`.
///
/// ```text
/// GET    /                   -> list_entities
/// POST   /                   -> register_entity
/// GET    /{id}               -> get_entity
/// DELETE /{id}               -> remove_entity
/// GET    /{id}/diagnosis     -> get_diagnosis
/// GET    /{id}/history       -> get_history
/// POST   /{id}/reset         -> reset_entity
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(entities::list_entities).post(entities::register_entity),
        )
        .route(
            "/{id}",
            get(entities::get_entity).delete(entities::remove_entity),
        )
        .route("/{id}/diagnosis", get(entities::get_diagnosis))
        .route("/{id}/history", get(entities::get_history))
        .route("/{id}/reset", post(entities::reset_entity))
}
