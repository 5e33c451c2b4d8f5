use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid mode: {0} (expected one of normal, vacation, night)")]
    InvalidMode(String),

    #[error("Malformed event for {entity_id}: {reason}")]
    MalformedEvent { entity_id: EntityId, reason: String },
}
