//! Diagnostic export documents and storage statistics.

use lastseen_core::config::MonitorConfig;
use lastseen_core::diagnosis::{Diagnosis, TechnicalContext};
use lastseen_core::entity::TrackedEntity;
use lastseen_core::health::{HealthCounts, HealthState};
use lastseen_core::mode::Mode;
use lastseen_core::snapshot::EntityStats;
use lastseen_core::types::{to_timestamp, EpochSeconds, Timestamp};
use serde::Serialize;

use crate::registry::RecordCopy;

/// Format version of export documents.
pub const EXPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Volume of data held by the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataStats {
    pub entity_count: usize,
    pub total_events: u64,
    pub total_history_items: usize,
    /// Oldest last-event time across all entities.
    pub oldest_event: Option<Timestamp>,
    /// Newest last-event time across all entities.
    pub newest_event: Option<Timestamp>,
}

impl DataStats {
    pub fn from_records(records: &[RecordCopy]) -> Self {
        let mut oldest: Option<EpochSeconds> = None;
        let mut newest: Option<EpochSeconds> = None;
        for last in records.iter().filter_map(|r| r.cadence.last_event_timestamp()) {
            oldest = Some(oldest.map_or(last, |o| o.min(last)));
            newest = Some(newest.map_or(last, |n| n.max(last)));
        }

        Self {
            entity_count: records.len(),
            total_events: records.iter().map(|r| r.cadence.event_count()).sum(),
            total_history_items: records.iter().map(|r| r.history.len()).sum(),
            oldest_event: oldest.and_then(to_timestamp),
            newest_event: newest.and_then(to_timestamp),
        }
    }
}

/// Whole-engine diagnostic document.
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub version: &'static str,
    pub generated_at: Timestamp,
    pub config: MonitorConfig,
    pub mode: Mode,
    pub data_stats: DataStats,
    pub summary: HealthCounts,
    pub entity_count: usize,
    /// Reference time of the snapshot the summary was taken from.
    pub snapshot_at: Option<Timestamp>,
}

/// Diagnostic document for a single entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityExport {
    pub version: &'static str,
    pub generated_at: Timestamp,
    pub entity_id: String,
    pub health: HealthState,
    pub suppressed: bool,
    pub warmed_up: bool,
    pub stats: EntityStats,
    pub metadata: TrackedEntity,
    pub context: Option<TechnicalContext>,
    pub diagnosis: Diagnosis,
}

#[cfg(test)]
mod tests {
    use lastseen_core::cadence::CadenceTracker;

    use super::*;

    fn copy(id: &str, timestamps: &[f64]) -> RecordCopy {
        let mut tracker = CadenceTracker::new(0.1, 3);
        for ts in timestamps {
            tracker.observe(id, *ts, None).unwrap();
        }
        RecordCopy {
            entity: TrackedEntity::new(id),
            cadence: tracker.state().clone(),
            history: tracker.history().to_vec(),
            context: None,
        }
    }

    #[test]
    fn stats_sum_events_and_history() {
        let records = vec![
            copy("sensor.a", &[100.0, 200.0, 300.0, 400.0, 500.0]),
            copy("sensor.b", &[1_000.0, 1_100.0]),
            copy("sensor.c", &[]),
        ];

        let stats = DataStats::from_records(&records);

        assert_eq!(stats.entity_count, 3);
        assert_eq!(stats.total_events, 7);
        // history ring of 3 caps sensor.a
        assert_eq!(stats.total_history_items, 4);
        assert_eq!(stats.oldest_event.unwrap().timestamp(), 500);
        assert_eq!(stats.newest_event.unwrap().timestamp(), 1_100);
    }

    #[test]
    fn empty_registry_has_no_bounds() {
        let stats = DataStats::from_records(&[]);
        assert_eq!(stats, DataStats::default());
    }
}
