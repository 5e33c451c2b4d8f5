//! The monitor: routes inbound events into the registry, runs evaluation
//! sweeps and answers queries against the latest published snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lastseen_core::alerts::{evaluate_alerts, Alert, AlertThrottle};
use lastseen_core::cadence::{validate_timestamp, CadenceTracker, HistoryEntry, Observation};
use lastseen_core::config::MonitorConfig;
use lastseen_core::diagnosis::{diagnose, Diagnosis};
use lastseen_core::entity::{validate_entity_id, EntityMetadata, TrackedEntity};
use lastseen_core::error::CoreError;
use lastseen_core::health::HealthCounts;
use lastseen_core::mode::{Mode, ModePolicy};
use lastseen_core::snapshot::{EntityFilter, EntitySnapshot, Snapshot};
use lastseen_core::types::{now_epoch_seconds, to_timestamp, EntityId, EpochSeconds};
use lastseen_events::bus::{
    ALERT_RAISED, ENTITY_REMOVED, EVALUATION_COMPLETED, HEALTH_CHANGED, LEARNING_RESET,
    MODE_CHANGED,
};
use lastseen_events::{EventBus, MonitorEvent};
use tokio::sync::{Mutex, RwLock};

use crate::export::{DataStats, EntityExport, ExportDocument, EXPORT_VERSION};
use crate::feed::{EntityEvent, IngestOutcome};
use crate::metadata::{MetadataProvider, NoMetadata};
use crate::mode::ModeSwitch;
use crate::registry::{EntityRecord, RecordCopy, RecordHandle, Registry};

/// Entity health monitor.
///
/// Designed to be wrapped in `Arc` and shared between the event feed, the
/// scheduler and the query surface.
pub struct Monitor {
    registry: Registry,
    mode: ModeSwitch,
    config: RwLock<MonitorConfig>,
    latest: RwLock<Arc<Snapshot>>,
    throttle: Mutex<AlertThrottle>,
    /// Serializes sweeps so health diffs and throttling see one order.
    sweep: Mutex<()>,
    metadata: Arc<dyn MetadataProvider>,
    bus: Arc<EventBus>,
}

impl Monitor {
    /// Create a monitor with a validated configuration.
    pub fn new(config: MonitorConfig, bus: Arc<EventBus>) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            registry: Registry::new(),
            mode: ModeSwitch::default(),
            throttle: Mutex::new(AlertThrottle::new(config.alert_throttle_secs)),
            config: RwLock::new(config),
            latest: RwLock::new(Arc::new(Snapshot::empty(Mode::default()))),
            sweep: Mutex::new(()),
            metadata: Arc::new(NoMetadata),
            bus,
        })
    }

    /// Use `provider` to fill metadata of newly seen entities.
    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = provider;
        self
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ---- Event feed ----

    /// Route one inbound event to its entity, registering unknown entities.
    ///
    /// Never fails: malformed events are logged and dropped, duplicates and
    /// reordered events leave the learned cadence untouched.
    pub async fn ingest(&self, event: EntityEvent) -> IngestOutcome {
        if let Err(e) = validate_entity_id(&event.entity_id)
            .and_then(|()| validate_timestamp(&event.entity_id, event.timestamp))
        {
            tracing::warn!(entity_id = %event.entity_id, error = %e, "Dropping malformed event");
            return IngestOutcome::Rejected;
        }

        let (handle, created) = self.record_for(&event.entity_id, None).await;
        if created {
            tracing::debug!(entity_id = %event.entity_id, "Tracking new entity");
            self.enforce_capacity(Some(&event.entity_id)).await;
        }

        let mut record = handle.lock().await;
        if event.context.is_some() {
            record.context = event.context;
        }
        match record
            .tracker
            .observe(&event.entity_id, event.timestamp, event.state)
        {
            Ok(Observation::First) => IngestOutcome::First,
            Ok(Observation::Interval { delta }) => {
                tracing::trace!(
                    entity_id = %event.entity_id,
                    delta,
                    count = record.tracker.state().event_count(),
                    "Interval learned"
                );
                IngestOutcome::Accepted
            }
            Ok(Observation::OutOfOrder { delta }) => {
                tracing::debug!(
                    entity_id = %event.entity_id,
                    delta,
                    "Ignoring duplicate or out-of-order event"
                );
                IngestOutcome::Ignored
            }
            Err(e) => {
                tracing::warn!(entity_id = %event.entity_id, error = %e, "Dropping malformed event");
                IngestOutcome::Rejected
            }
        }
    }

    /// Decode and route one event from untrusted JSON.
    ///
    /// Undecodable events are logged and reported as
    /// [`IngestOutcome::Rejected`], like any other malformed event.
    pub async fn ingest_json(&self, value: serde_json::Value) -> IngestOutcome {
        match EntityEvent::from_json(value) {
            Ok(event) => self.ingest(event).await,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed event");
                IngestOutcome::Rejected
            }
        }
    }

    /// Start tracking an entity or refresh its metadata.
    ///
    /// Without explicit metadata the provider is asked. Returns whether the
    /// entity was newly registered.
    pub async fn register(
        &self,
        entity_id: &str,
        metadata: Option<EntityMetadata>,
    ) -> Result<bool, CoreError> {
        validate_entity_id(entity_id)?;
        let metadata = metadata.or_else(|| self.metadata.lookup(entity_id));

        let (handle, created) = self.record_for(entity_id, metadata.clone()).await;
        if created {
            self.enforce_capacity(Some(entity_id)).await;
        } else if let Some(metadata) = metadata {
            handle.lock().await.entity.apply_metadata(metadata);
        }
        tracing::info!(entity_id, created, "Entity registered");
        Ok(created)
    }

    /// Stop tracking an entity and drop its learned data.
    pub async fn remove(&self, entity_id: &str) -> Result<(), CoreError> {
        if !self.registry.remove(entity_id).await {
            return Err(CoreError::NotFound(entity_id.to_string()));
        }
        self.throttle.lock().await.forget(entity_id);
        self.bus.publish(
            MonitorEvent::new(ENTITY_REMOVED)
                .for_entity(entity_id)
                .with_payload(serde_json::json!({ "reason": "removed" })),
        );
        self.patch_snapshot(&HashSet::from([entity_id.to_string()]), &HashSet::new())
            .await;
        tracing::info!(entity_id, "Entity removed");
        Ok(())
    }

    /// Evict least recently active entities until the registry fits
    /// `max_tracked_entities`. `newest` is never evicted.
    async fn enforce_capacity(&self, newest: Option<&str>) {
        let max = self.config.read().await.max_tracked_entities;
        let mut evicted = HashSet::new();
        while self.registry.len().await > max {
            let Some(victim) = self.registry.least_recent(newest).await else {
                break;
            };
            if !self.registry.remove(&victim).await {
                continue;
            }
            self.throttle.lock().await.forget(&victim);
            tracing::warn!(entity_id = %victim, max, "Tracked entity limit reached, evicting");
            self.bus.publish(
                MonitorEvent::new(ENTITY_REMOVED)
                    .for_entity(victim.clone())
                    .with_payload(serde_json::json!({ "reason": "capacity" })),
            );
            evicted.insert(victim);
        }
        if !evicted.is_empty() {
            self.patch_snapshot(&evicted, &HashSet::new()).await;
        }
    }

    async fn record_for(
        &self,
        entity_id: &str,
        metadata: Option<EntityMetadata>,
    ) -> (RecordHandle, bool) {
        let (alpha, capacity) = {
            let config = self.config.read().await;
            (config.smoothing_factor, config.history_capacity)
        };
        self.registry
            .get_or_insert_with(entity_id, || {
                let entity = match metadata.or_else(|| self.metadata.lookup(entity_id)) {
                    Some(metadata) => TrackedEntity::with_metadata(entity_id, metadata),
                    None => TrackedEntity::new(entity_id),
                };
                EntityRecord::new(entity, CadenceTracker::new(alpha, capacity))
            })
            .await
    }

    // ---- Mode & configuration ----

    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    /// Switch mode by name. Unknown names leave the current mode in place.
    pub fn set_mode(&self, mode_id: &str) -> Result<Mode, CoreError> {
        let mode: Mode = mode_id.parse()?;
        self.set_mode_to(mode);
        Ok(mode)
    }

    /// Install `mode`; returns the previous mode. Learned data is untouched.
    pub fn set_mode_to(&self, mode: Mode) -> Mode {
        let previous = self.mode.replace(mode);
        if previous != mode {
            tracing::info!(from = %previous, to = %mode, "Mode changed");
            self.bus.publish(
                MonitorEvent::new(MODE_CHANGED)
                    .with_payload(serde_json::json!({ "from": previous, "to": mode })),
            );
        }
        previous
    }

    pub async fn config(&self) -> MonitorConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration. Takes effect at the next sweep; learning
    /// parameters apply to entities registered or reset afterwards.
    pub async fn update_config(&self, config: MonitorConfig) -> Result<MonitorConfig, CoreError> {
        config.validate()?;
        self.throttle
            .lock()
            .await
            .set_window(config.alert_throttle_secs);
        *self.config.write().await = config.clone();
        tracing::info!(
            check_every_minutes = config.check_every_minutes,
            alert_threshold_multiplier = config.alert_threshold_multiplier,
            enable_notifications = config.enable_notifications,
            max_tracked_entities = config.max_tracked_entities,
            "Configuration updated"
        );
        self.enforce_capacity(None).await;
        Ok(config)
    }

    // ---- Evaluation ----

    /// Run a sweep at the current wall-clock time.
    pub async fn evaluate(&self) -> Arc<Snapshot> {
        self.evaluate_at(now_epoch_seconds()).await
    }

    /// Run a sweep with `now` as the reference time of every entity.
    ///
    /// Publishes the snapshot, a `health.changed` event per transition since
    /// the previous sweep, and any alerts that pass the throttle.
    pub async fn evaluate_at(&self, now: EpochSeconds) -> Arc<Snapshot> {
        let _sweep = self.sweep.lock().await;
        let config = self.config().await;
        let policy = ModePolicy::for_mode(self.mode.get(), config.alert_threshold_multiplier);
        let limits = config.warmup_limits();

        let mut contexts = HashMap::new();
        let entities: Vec<EntitySnapshot> = self
            .registry
            .copy_all()
            .await
            .into_iter()
            .map(|copy| {
                if let Some(ctx) = copy.context {
                    contexts.insert(copy.entity.entity_id.clone(), ctx);
                }
                EntitySnapshot::evaluate(
                    now,
                    &copy.entity,
                    &copy.cadence,
                    copy.history,
                    &policy,
                    limits,
                )
            })
            .collect();

        let snapshot = Arc::new(Snapshot::new(now, policy.mode, entities));
        let previous = std::mem::replace(&mut *self.latest.write().await, Arc::clone(&snapshot));
        self.publish_health_changes(&previous, &snapshot);

        let alerts = {
            let mut throttle = self.throttle.lock().await;
            evaluate_alerts(
                &snapshot,
                &policy,
                config.enable_notifications,
                &mut throttle,
                &config.diagnosis_thresholds(),
                |entity| contexts.get(&entity.entity_id).copied(),
            )
        };
        for alert in &alerts {
            self.publish_alert(alert);
        }

        let counts = snapshot.counts;
        tracing::info!(
            mode = %policy.mode,
            entities = counts.total(),
            ok = counts.ok_count,
            late = counts.late_count,
            stale = counts.stale_count,
            unknown = counts.unknown_count,
            suppressed = counts.suppressed_count,
            alerts = alerts.len(),
            "Evaluation completed"
        );
        self.bus.publish(MonitorEvent::new(EVALUATION_COMPLETED).with_payload(
            serde_json::json!({
                "generated_at": now,
                "mode": policy.mode,
                "counts": counts,
                "alerts": alerts.len(),
            }),
        ));

        snapshot
    }

    fn publish_health_changes(&self, previous: &Snapshot, current: &Snapshot) {
        for entity in &current.entities {
            let before = previous.get(&entity.entity_id).map(|e| e.health);
            let changed = match before {
                Some(before) => before != entity.health,
                None => entity.health.is_problem(),
            };
            if !changed {
                continue;
            }
            tracing::debug!(
                entity_id = %entity.entity_id,
                from = ?before,
                to = %entity.health,
                "Health changed"
            );
            self.bus.publish(
                MonitorEvent::new(HEALTH_CHANGED)
                    .for_entity(entity.entity_id.clone())
                    .with_payload(serde_json::json!({
                        "from": before,
                        "to": entity.health,
                        "suppressed": entity.suppressed,
                    })),
            );
        }
    }

    fn publish_alert(&self, alert: &Alert) {
        match serde_json::to_value(alert) {
            Ok(payload) => self.bus.publish(
                MonitorEvent::new(ALERT_RAISED)
                    .for_entity(alert.entity_id.clone())
                    .with_payload(payload),
            ),
            Err(e) => {
                tracing::error!(entity_id = %alert.entity_id, error = %e, "Failed to encode alert");
            }
        }
    }

    // ---- Queries ----

    /// Latest published snapshot.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.latest.read().await)
    }

    pub async fn counts(&self) -> HealthCounts {
        self.latest.read().await.counts
    }

    /// Snapshot entries matching `filter`.
    pub async fn entities(&self, filter: &EntityFilter) -> Vec<EntitySnapshot> {
        self.snapshot().await.filter(filter).cloned().collect()
    }

    /// One entity as of the latest snapshot.
    ///
    /// Entities registered since that sweep are evaluated on the spot at the
    /// current time.
    pub async fn entity(&self, entity_id: &str) -> Result<EntitySnapshot, CoreError> {
        if let Some(entity) = self.snapshot().await.get(entity_id) {
            return Ok(entity.clone());
        }
        let copy = self.copy(entity_id).await?;
        Ok(self
            .evaluate_copy(now_epoch_seconds(), self.mode.get(), copy)
            .await)
    }

    /// Probable causes for an entity's current health.
    pub async fn diagnose(&self, entity_id: &str) -> Result<Diagnosis, CoreError> {
        let entity = self.entity(entity_id).await?;
        let context = self.copy(entity_id).await.ok().and_then(|c| c.context);
        let limits = self.config.read().await.diagnosis_thresholds();
        Ok(diagnose(&entity, context.as_ref(), &limits))
    }

    /// Most recent `limit` history entries, oldest first; all when `None`.
    pub async fn history(
        &self,
        entity_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, CoreError> {
        let handle = self
            .registry
            .get(entity_id)
            .await
            .ok_or_else(|| CoreError::NotFound(entity_id.to_string()))?;
        let record = handle.lock().await;
        let history = record.tracker.history();
        Ok(match limit {
            Some(limit) => history.recent(limit),
            None => history.to_vec(),
        })
    }

    pub async fn data_stats(&self) -> DataStats {
        DataStats::from_records(&self.registry.copy_all().await)
    }

    pub async fn tracked_ids(&self) -> Vec<EntityId> {
        self.registry.ids().await
    }

    pub async fn tracked_count(&self) -> usize {
        self.registry.len().await
    }

    // ---- Maintenance ----

    /// Discard learned cadence for one entity, or for all when `None`.
    ///
    /// Returns the number of entities reset. Metadata and technical context
    /// are kept.
    pub async fn reset_learning(&self, entity_id: Option<&str>) -> Result<usize, CoreError> {
        let handles = match entity_id {
            Some(id) => {
                let handle = self
                    .registry
                    .get(id)
                    .await
                    .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
                vec![(id.to_string(), handle)]
            }
            None => self.registry.handles().await,
        };
        let (alpha, capacity) = {
            let config = self.config.read().await;
            (config.smoothing_factor, config.history_capacity)
        };

        let mut throttle = self.throttle.lock().await;
        for (id, handle) in &handles {
            handle.lock().await.tracker = CadenceTracker::new(alpha, capacity);
            throttle.forget(id);
        }
        drop(throttle);

        let reset: HashSet<EntityId> = handles.iter().map(|(id, _)| id.clone()).collect();
        self.patch_snapshot(&HashSet::new(), &reset).await;

        let count = handles.len();
        tracing::info!(entity_id = entity_id.unwrap_or("*"), count, "Learning reset");
        let mut event = MonitorEvent::new(LEARNING_RESET)
            .with_payload(serde_json::json!({ "count": count }));
        if let Some(id) = entity_id {
            event = event.for_entity(id);
        }
        self.bus.publish(event);
        Ok(count)
    }

    /// Remove every tracked entity not in `valid_ids`. Returns the removed
    /// ids, sorted.
    pub async fn cleanup_orphans(&self, valid_ids: &[EntityId]) -> Vec<EntityId> {
        let keep: HashSet<EntityId> = valid_ids.iter().cloned().collect();
        let removed = self.registry.retain(&keep).await;

        let mut throttle = self.throttle.lock().await;
        for id in &removed {
            throttle.forget(id);
            self.bus.publish(
                MonitorEvent::new(ENTITY_REMOVED)
                    .for_entity(id.clone())
                    .with_payload(serde_json::json!({ "reason": "orphan" })),
            );
        }
        drop(throttle);

        if !removed.is_empty() {
            let gone: HashSet<EntityId> = removed.iter().cloned().collect();
            self.patch_snapshot(&gone, &HashSet::new()).await;
            tracing::info!(count = removed.len(), "Orphaned entities removed");
        }
        removed
    }

    // ---- Export ----

    /// Whole-engine diagnostic document.
    pub async fn export(&self) -> ExportDocument {
        let snapshot = self.snapshot().await;
        let data_stats = self.data_stats().await;
        ExportDocument {
            version: EXPORT_VERSION,
            generated_at: chrono::Utc::now(),
            config: self.config().await,
            mode: self.mode(),
            entity_count: data_stats.entity_count,
            data_stats,
            summary: snapshot.counts,
            snapshot_at: if snapshot.generated_at > 0.0 {
                to_timestamp(snapshot.generated_at)
            } else {
                None
            },
        }
    }

    /// Diagnostic document for one entity.
    pub async fn export_entity(&self, entity_id: &str) -> Result<EntityExport, CoreError> {
        let entity = self.entity(entity_id).await?;
        let copy = self.copy(entity_id).await?;
        let limits = self.config.read().await.diagnosis_thresholds();
        let diagnosis = diagnose(&entity, copy.context.as_ref(), &limits);

        Ok(EntityExport {
            version: EXPORT_VERSION,
            generated_at: chrono::Utc::now(),
            entity_id: entity.entity_id,
            health: entity.health,
            suppressed: entity.suppressed,
            warmed_up: entity.warmed_up,
            stats: entity.stats,
            metadata: copy.entity,
            context: copy.context,
            diagnosis,
        })
    }

    // ---- Helpers ----

    async fn copy(&self, entity_id: &str) -> Result<RecordCopy, CoreError> {
        self.registry
            .copy(entity_id)
            .await
            .ok_or_else(|| CoreError::NotFound(entity_id.to_string()))
    }

    /// Republish the latest snapshot with `removed` entries dropped and
    /// `refreshed` entries re-evaluated at the snapshot's reference time.
    ///
    /// Holds the sweep lock so a concurrent sweep cannot publish entries
    /// copied before the change.
    async fn patch_snapshot(&self, removed: &HashSet<EntityId>, refreshed: &HashSet<EntityId>) {
        let _sweep = self.sweep.lock().await;
        let current = self.snapshot().await;
        let touched = current
            .entities
            .iter()
            .any(|e| removed.contains(&e.entity_id) || refreshed.contains(&e.entity_id));
        if !touched {
            return;
        }

        let mut entities = Vec::with_capacity(current.entities.len());
        for entry in &current.entities {
            if removed.contains(&entry.entity_id) {
                continue;
            }
            if !refreshed.contains(&entry.entity_id) {
                entities.push(entry.clone());
                continue;
            }
            // Gone from the registry since the refresh was requested.
            if let Ok(copy) = self.copy(&entry.entity_id).await {
                entities.push(
                    self.evaluate_copy(current.generated_at, current.mode, copy)
                        .await,
                );
            }
        }
        *self.latest.write().await =
            Arc::new(Snapshot::new(current.generated_at, current.mode, entities));
    }

    async fn evaluate_copy(&self, now: EpochSeconds, mode: Mode, copy: RecordCopy) -> EntitySnapshot {
        let config = self.config.read().await;
        let policy = ModePolicy::for_mode(mode, config.alert_threshold_multiplier);
        EntitySnapshot::evaluate(
            now,
            &copy.entity,
            &copy.cadence,
            copy.history,
            &policy,
            config.warmup_limits(),
        )
    }
}
