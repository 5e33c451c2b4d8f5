//! Inbound event feed types.

use lastseen_core::diagnosis::TechnicalContext;
use lastseen_core::error::CoreError;
use lastseen_core::types::{EntityId, EpochSeconds};
use serde::{Deserialize, Serialize};

/// One activity event from the host. Delivery is at-least-once and
/// unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub entity_id: EntityId,
    pub timestamp: EpochSeconds,
    #[serde(default)]
    pub state: Option<String>,
    /// Battery/radio readings that came with the event, if any.
    #[serde(default)]
    pub context: Option<TechnicalContext>,
}

impl EntityEvent {
    pub fn new(entity_id: impl Into<EntityId>, timestamp: EpochSeconds) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            state: None,
            context: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_context(mut self, context: TechnicalContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Decode one event from untrusted JSON.
    ///
    /// Anything that does not decode (missing id, non-numeric timestamp,
    /// wrong shape) is a [`CoreError::MalformedEvent`].
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        let entity_id = value
            .get("entity_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("-")
            .to_string();
        serde_json::from_value(value).map_err(|e| CoreError::MalformedEvent {
            entity_id,
            reason: e.to_string(),
        })
    }
}

/// What happened to an ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// First event of the entity; no interval yet.
    First,
    /// Interval learned.
    Accepted,
    /// Duplicate or reordered event; cadence unchanged.
    Ignored,
    /// Malformed event, dropped.
    Rejected,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
