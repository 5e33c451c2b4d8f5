//! Read-only projections produced by an evaluation sweep.

use serde::{Deserialize, Serialize};

use crate::cadence::{CadenceState, HistoryEntry};
use crate::entity::TrackedEntity;
use crate::health::{age_seconds, classify, HealthCounts, HealthState};
use crate::mode::{Mode, ModePolicy};
use crate::thresholds::{thresholds, Thresholds};
use crate::types::{EntityId, EpochSeconds};

/// Event-count thresholds that shape how a snapshot entry is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupLimits {
    /// Minimum events before a health other than UNKNOWN is produced.
    pub min_events_for_classification: u64,
    /// Events after which learning is considered complete.
    pub min_events_considered_warmed_up: u64,
}

/// Cadence statistics for one entity at the snapshot's reference time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityStats {
    pub last_event: Option<EpochSeconds>,
    pub interval_ewma: Option<f64>,
    pub threshold: Option<f64>,
    pub ok_bound: Option<f64>,
    pub late_bound: Option<f64>,
    pub event_count: u64,
    /// Seconds since the last event at the snapshot's reference time.
    pub age: Option<f64>,
    pub history: Vec<HistoryEntry>,
}

/// One entity's derived health plus the facts it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub domain: String,
    pub area_id: Option<String>,
    pub device_id: Option<String>,
    pub platform: Option<String>,
    pub labels: Vec<String>,
    pub health: HealthState,
    /// The active mode excludes this entity's domain from escalation.
    pub suppressed: bool,
    /// Enough events have been seen to consider learning complete.
    pub warmed_up: bool,
    pub stats: EntityStats,
}

impl EntitySnapshot {
    /// Evaluate one entity at reference time `now`.
    pub fn evaluate(
        now: EpochSeconds,
        entity: &TrackedEntity,
        cadence: &CadenceState,
        history: Vec<HistoryEntry>,
        policy: &ModePolicy,
        limits: WarmupLimits,
    ) -> Self {
        let consistent = cadence.is_consistent();
        let bounds: Option<Thresholds> = if consistent {
            thresholds(cadence, policy)
        } else {
            None
        };
        let health = classify(
            now,
            cadence,
            bounds.as_ref(),
            limits.min_events_for_classification,
        );
        let suppressed = health.is_problem() && policy.ignores_domain(&entity.domain);

        Self {
            entity_id: entity.entity_id.clone(),
            domain: entity.domain.clone(),
            area_id: entity.area_id.clone(),
            device_id: entity.device_id.clone(),
            platform: entity.platform.clone(),
            labels: entity.labels.iter().cloned().collect(),
            health,
            suppressed,
            warmed_up: cadence.event_count() >= limits.min_events_considered_warmed_up,
            stats: EntityStats {
                last_event: cadence.last_event_timestamp(),
                interval_ewma: cadence.interval_ewma(),
                threshold: bounds.map(|b| b.threshold),
                ok_bound: bounds.map(|b| b.ok_bound),
                late_bound: bounds.map(|b| b.late_bound),
                event_count: cadence.event_count(),
                age: if consistent { age_seconds(now, cadence) } else { None },
                history,
            },
        }
    }

    /// Whether this entity counts towards alerting in the active mode.
    pub fn is_reportable_problem(&self) -> bool {
        self.health.is_problem() && !self.suppressed
    }
}

/// A consistent, point-in-time read of every tracked entity.
///
/// All entries share `generated_at` as their reference time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub generated_at: EpochSeconds,
    pub mode: Mode,
    /// Sorted by `entity_id`.
    pub entities: Vec<EntitySnapshot>,
    pub counts: HealthCounts,
}

impl Snapshot {
    /// Assemble a snapshot; entries are sorted and counts derived here.
    pub fn new(generated_at: EpochSeconds, mode: Mode, mut entities: Vec<EntitySnapshot>) -> Self {
        entities.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        let counts = HealthCounts::tally(entities.iter().map(|e| (e.health, e.suppressed)));
        Self {
            generated_at,
            mode,
            entities,
            counts,
        }
    }

    /// Snapshot with no entities, used before the first sweep.
    pub fn empty(mode: Mode) -> Self {
        Self::new(0.0, mode, Vec::new())
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntitySnapshot> {
        self.entities
            .binary_search_by(|e| e.entity_id.as_str().cmp(entity_id))
            .ok()
            .map(|idx| &self.entities[idx])
    }

    /// Entries matching `filter`, in snapshot order.
    pub fn filter<'a>(
        &'a self,
        filter: &'a EntityFilter,
    ) -> impl Iterator<Item = &'a EntitySnapshot> {
        self.entities.iter().filter(move |e| filter.matches(e))
    }
}

/// Registry query over a snapshot. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EntityFilter {
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub health: Option<HealthState>,
}

impl EntityFilter {
    pub fn matches(&self, entity: &EntitySnapshot) -> bool {
        self.area
            .as_deref()
            .map_or(true, |area| entity.area_id.as_deref() == Some(area))
            && self
                .label
                .as_deref()
                .map_or(true, |label| entity.labels.iter().any(|l| l == label))
            && self.domain.as_deref().map_or(true, |domain| entity.domain == domain)
            && self.health.map_or(true, |health| entity.health == health)
    }
}
