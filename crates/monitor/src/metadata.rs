//! Registry metadata lookup supplied by the host.

use std::collections::HashMap;
use std::sync::RwLock;

use lastseen_core::entity::EntityMetadata;
use lastseen_core::types::EntityId;

/// Best-effort source of entity metadata.
///
/// A missing answer is never an error: the entity is tracked with metadata
/// derived from its id.
pub trait MetadataProvider: Send + Sync {
    fn lookup(&self, entity_id: &str) -> Option<EntityMetadata>;
}

/// Provider that knows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl MetadataProvider for NoMetadata {
    fn lookup(&self, _entity_id: &str) -> Option<EntityMetadata> {
        None
    }
}

/// In-memory provider, filled by the host or by tests.
#[derive(Debug, Default)]
pub struct StaticMetadata {
    entries: RwLock<HashMap<EntityId, EntityMetadata>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity_id: impl Into<EntityId>, metadata: EntityMetadata) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(entity_id.into(), metadata);
    }
}

impl MetadataProvider for StaticMetadata {
    fn lookup(&self, entity_id: &str) -> Option<EntityMetadata> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(entity_id).cloned()
    }
}
