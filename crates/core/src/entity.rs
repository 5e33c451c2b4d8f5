//! Identity and registry metadata of a monitored entity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{domain_of, EntityId};

/// Maximum accepted length of an entity id.
const MAX_ENTITY_ID_LEN: usize = 255;

/// Metadata supplied by the host registry. Every field is optional; absent
/// metadata never blocks cadence learning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

/// A tracked entity's identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEntity {
    pub entity_id: EntityId,
    pub domain: String,
    pub area_id: Option<String>,
    pub device_id: Option<String>,
    pub platform: Option<String>,
    pub labels: BTreeSet<String>,
}

impl TrackedEntity {
    /// Entity with default metadata; the domain is taken from the id prefix.
    pub fn new(entity_id: impl Into<EntityId>) -> Self {
        let entity_id = entity_id.into();
        let domain = domain_of(&entity_id).to_string();
        Self {
            entity_id,
            domain,
            area_id: None,
            device_id: None,
            platform: None,
            labels: BTreeSet::new(),
        }
    }

    /// Entity populated from registry metadata.
    pub fn with_metadata(entity_id: impl Into<EntityId>, metadata: EntityMetadata) -> Self {
        let mut entity = Self::new(entity_id);
        entity.apply_metadata(metadata);
        entity
    }

    /// Replace registry metadata. A missing domain keeps the derived one.
    pub fn apply_metadata(&mut self, metadata: EntityMetadata) {
        if let Some(domain) = metadata.domain.filter(|d| !d.is_empty()) {
            self.domain = domain;
        }
        self.area_id = metadata.area_id;
        self.device_id = metadata.device_id;
        self.platform = metadata.platform;
        self.labels = metadata.labels;
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Validate an entity id received from outside the engine.
pub fn validate_entity_id(entity_id: &str) -> Result<(), CoreError> {
    if entity_id.trim().is_empty() {
        return Err(CoreError::Validation(
            "entity_id must not be empty".to_string(),
        ));
    }
    if entity_id.len() > MAX_ENTITY_ID_LEN {
        return Err(CoreError::Validation(format!(
            "entity_id must not exceed {MAX_ENTITY_ID_LEN} characters"
        )));
    }
    if entity_id.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!(
            "entity_id must not contain whitespace: \"{entity_id}\""
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_entity_derives_domain() {
        let e = TrackedEntity::new("binary_sensor.hall");
        assert_eq!(e.domain, "binary_sensor");
        assert!(e.area_id.is_none());
        assert!(e.labels.is_empty());
    }

    #[test]
    fn metadata_overrides_domain_and_fields() {
        let meta = EntityMetadata {
            domain: Some("sensor".into()),
            area_id: Some("kitchen".into()),
            device_id: Some("dev-1".into()),
            platform: Some("zha".into()),
            labels: ["zigbee".to_string()].into_iter().collect(),
        };
        let e = TrackedEntity::with_metadata("weird.id", meta);
        assert_eq!(e.domain, "sensor");
        assert_eq!(e.area_id.as_deref(), Some("kitchen"));
        assert!(e.has_label("zigbee"));
    }

    #[test]
    fn empty_metadata_domain_is_ignored() {
        let meta = EntityMetadata {
            domain: Some(String::new()),
            ..Default::default()
        };
        let e = TrackedEntity::with_metadata("light.porch", meta);
        assert_eq!(e.domain, "light");
    }

    #[test]
    fn entity_id_validation() {
        assert!(validate_entity_id("sensor.ok").is_ok());
        assert!(validate_entity_id("").is_err());
        assert!(validate_entity_id("   ").is_err());
        assert!(validate_entity_id("sensor.has space").is_err());
        assert!(validate_entity_id(&"x".repeat(256)).is_err());
    }
}
