//! Entity registry: owns every tracked entity's identity and cadence.
//!
//! Each record sits behind its own `Mutex`; the map lock is only held to
//! look up, insert or remove record handles, never while a record is being
//! mutated or copied.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lastseen_core::cadence::{CadenceState, CadenceTracker, HistoryEntry};
use lastseen_core::diagnosis::TechnicalContext;
use lastseen_core::entity::TrackedEntity;
use lastseen_core::types::{EntityId, EpochSeconds};
use tokio::sync::{Mutex, RwLock};

/// Everything the engine stores about one entity.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub entity: TrackedEntity,
    pub tracker: CadenceTracker,
    /// Latest technical readings reported with an event.
    pub context: Option<TechnicalContext>,
}

impl EntityRecord {
    pub fn new(entity: TrackedEntity, tracker: CadenceTracker) -> Self {
        Self {
            entity,
            tracker,
            context: None,
        }
    }
}

/// Point-in-time copy of a record, taken under the record's lock.
#[derive(Debug, Clone)]
pub struct RecordCopy {
    pub entity: TrackedEntity,
    pub cadence: CadenceState,
    pub history: Vec<HistoryEntry>,
    pub context: Option<TechnicalContext>,
}

pub type RecordHandle = Arc<Mutex<EntityRecord>>;

/// Map of all tracked entities.
///
/// Thread-safe via interior locks; designed to be shared inside the
/// monitor.
#[derive(Default)]
pub struct Registry {
    records: RwLock<HashMap<EntityId, RecordHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, entity_id: &str) -> Option<RecordHandle> {
        self.records.read().await.get(entity_id).cloned()
    }

    /// Handle for `entity_id`, creating the record with `make` if absent.
    ///
    /// Returns the handle and whether it was newly created.
    pub async fn get_or_insert_with<F>(&self, entity_id: &str, make: F) -> (RecordHandle, bool)
    where
        F: FnOnce() -> EntityRecord,
    {
        if let Some(handle) = self.get(entity_id).await {
            return (handle, false);
        }

        let mut records = self.records.write().await;
        // Another writer may have inserted between the two locks.
        if let Some(handle) = records.get(entity_id) {
            return (Arc::clone(handle), false);
        }
        let handle = Arc::new(Mutex::new(make()));
        records.insert(entity_id.to_string(), Arc::clone(&handle));
        (handle, true)
    }

    /// Stop tracking an entity. Returns whether it was tracked.
    pub async fn remove(&self, entity_id: &str) -> bool {
        self.records.write().await.remove(entity_id).is_some()
    }

    /// Remove every entity not in `keep`; returns the removed ids, sorted.
    pub async fn retain(&self, keep: &HashSet<EntityId>) -> Vec<EntityId> {
        let mut records = self.records.write().await;
        let mut removed: Vec<EntityId> = records
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for id in &removed {
            records.remove(id);
        }
        removed.sort();
        removed
    }

    /// Clone every record handle under a brief read lock.
    pub async fn handles(&self) -> Vec<(EntityId, RecordHandle)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect()
    }

    /// Copy every record, one record lock at a time.
    pub async fn copy_all(&self) -> Vec<RecordCopy> {
        let mut copies = Vec::new();
        for (_, handle) in self.handles().await {
            copies.push(copy_record(&handle).await);
        }
        copies
    }

    pub async fn copy(&self, entity_id: &str) -> Option<RecordCopy> {
        let handle = self.get(entity_id).await?;
        Some(copy_record(&handle).await)
    }

    /// Entity with the oldest last event, other than `except`.
    ///
    /// Entities that never reported count as oldest; ties go to the smallest
    /// id.
    pub async fn least_recent(&self, except: Option<&str>) -> Option<EntityId> {
        let mut oldest: Option<(EpochSeconds, EntityId)> = None;
        for (id, handle) in self.handles().await {
            if except == Some(id.as_str()) {
                continue;
            }
            let last = handle
                .lock()
                .await
                .tracker
                .state()
                .last_event_timestamp()
                .unwrap_or(f64::NEG_INFINITY);
            let older = match &oldest {
                None => true,
                Some((best, best_id)) => last < *best || (last == *best && id < *best_id),
            };
            if older {
                oldest = Some((last, id));
            }
        }
        oldest.map(|(_, id)| id)
    }

    pub async fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

async fn copy_record(handle: &RecordHandle) -> RecordCopy {
    let record = handle.lock().await;
    RecordCopy {
        entity: record.entity.clone(),
        cadence: record.tracker.state().clone(),
        history: record.tracker.history().to_vec(),
        context: record.context,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> EntityRecord {
        EntityRecord::new(TrackedEntity::new(id), CadenceTracker::new(0.1, 10))
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let registry = Registry::new();
        let (_, created) = registry.get_or_insert_with("sensor.a", || record("sensor.a")).await;
        assert!(created);
        let (_, created) = registry.get_or_insert_with("sensor.a", || record("sensor.a")).await;
        assert!(!created);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn copies_are_detached_from_the_record() {
        let registry = Registry::new();
        let (handle, _) = registry.get_or_insert_with("sensor.a", || record("sensor.a")).await;
        handle.lock().await.tracker.observe("sensor.a", 10.0, None).unwrap();

        let copy = registry.copy("sensor.a").await.unwrap();
        handle.lock().await.tracker.observe("sensor.a", 20.0, None).unwrap();

        assert_eq!(copy.cadence.event_count(), 1);
        assert_eq!(registry.copy("sensor.a").await.unwrap().cadence.event_count(), 2);
    }

    #[tokio::test]
    async fn retain_removes_orphans() {
        let registry = Registry::new();
        for id in ["sensor.a", "sensor.b", "sensor.c"] {
            registry.get_or_insert_with(id, || record(id)).await;
        }
        let keep: HashSet<EntityId> = ["sensor.b".to_string()].into_iter().collect();

        let removed = registry.retain(&keep).await;

        assert_eq!(removed, vec!["sensor.a".to_string(), "sensor.c".to_string()]);
        assert_eq!(registry.ids().await, vec!["sensor.b".to_string()]);
    }

    #[tokio::test]
    async fn remove_reports_whether_tracked() {
        let registry = Registry::new();
        registry.get_or_insert_with("sensor.a", || record("sensor.a")).await;
        assert!(registry.remove("sensor.a").await);
        assert!(!registry.remove("sensor.a").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn least_recent_skips_the_excluded_entity() {
        let registry = Registry::new();
        for (id, ts) in [("sensor.a", 300.0), ("sensor.b", 100.0), ("sensor.c", 200.0)] {
            let (handle, _) = registry.get_or_insert_with(id, || record(id)).await;
            handle.lock().await.tracker.observe(id, ts, None).unwrap();
        }
        registry.get_or_insert_with("sensor.new", || record("sensor.new")).await;

        assert_eq!(
            registry.least_recent(Some("sensor.new")).await.as_deref(),
            Some("sensor.b")
        );
        // Never reported counts as oldest.
        assert_eq!(registry.least_recent(None).await.as_deref(), Some("sensor.new"));
    }
}
