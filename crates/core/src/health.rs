//! Health classification.
//!
//! Health is recomputed from current facts on every evaluation; there is no
//! stored previous state, so an entity moves from STALE straight back to OK
//! as soon as a new event arrives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cadence::CadenceState;
use crate::thresholds::Thresholds;
use crate::types::EpochSeconds;

/// Entities with fewer events than this are always UNKNOWN.
pub const MIN_EVENTS_FOR_CLASSIFICATION: u64 = 2;

// ---------------------------------------------------------------------------
// HealthState
// ---------------------------------------------------------------------------

/// Health of one entity. Variants are declared in severity order, so the
/// derived `Ord` gives `Unknown < Ok < Late < Stale`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Ok,
    Late,
    Stale,
}

impl HealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Ok => "ok",
            HealthState::Late => "late",
            HealthState::Stale => "stale",
        }
    }

    /// LATE and STALE are problems; UNKNOWN is an expected warm-up outcome.
    pub fn is_problem(self) -> bool {
        matches!(self, HealthState::Late | HealthState::Stale)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Seconds since the entity's last event at reference time `now`.
///
/// Clock skew that would yield a negative age is clamped to zero.
pub fn age_seconds(now: EpochSeconds, cadence: &CadenceState) -> Option<f64> {
    let last = cadence.last_event_timestamp()?;
    let age = now - last;
    if !age.is_finite() {
        return None;
    }
    Some(age.max(0.0))
}

/// Classify an entity at reference time `now`.
///
/// Evaluated in order:
/// 1. fewer than `min_events` events → UNKNOWN,
/// 2. inconsistent state or undefined thresholds → UNKNOWN,
/// 3. `age < ok_bound` → OK,
/// 4. `age < late_bound` → LATE,
/// 5. otherwise STALE.
pub fn classify(
    now: EpochSeconds,
    cadence: &CadenceState,
    thresholds: Option<&Thresholds>,
    min_events: u64,
) -> HealthState {
    if cadence.event_count() < min_events {
        return HealthState::Unknown;
    }
    if !cadence.is_consistent() {
        return HealthState::Unknown;
    }
    let (Some(t), Some(age)) = (thresholds, age_seconds(now, cadence)) else {
        return HealthState::Unknown;
    };

    if age < t.ok_bound {
        HealthState::Ok
    } else if age < t.late_bound {
        HealthState::Late
    } else {
        HealthState::Stale
    }
}

// ---------------------------------------------------------------------------
// Aggregate counts
// ---------------------------------------------------------------------------

/// Totals over all tracked entities, derived from one snapshot.
///
/// Entities whose problem state is suppressed by the active mode are counted
/// in `suppressed_count` instead of `late_count`/`stale_count` and never set
/// `any_problem`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub ok_count: usize,
    pub late_count: usize,
    pub stale_count: usize,
    pub unknown_count: usize,
    pub suppressed_count: usize,
    pub any_problem: bool,
}

impl HealthCounts {
    /// Reduce `(health, suppressed)` pairs into totals.
    pub fn tally<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (HealthState, bool)>,
    {
        let mut counts = Self::default();
        for (health, suppressed) in items {
            if suppressed && health.is_problem() {
                counts.suppressed_count += 1;
                continue;
            }
            match health {
                HealthState::Ok => counts.ok_count += 1,
                HealthState::Late => counts.late_count += 1,
                HealthState::Stale => counts.stale_count += 1,
                HealthState::Unknown => counts.unknown_count += 1,
            }
        }
        counts.any_problem = counts.late_count > 0 || counts.stale_count > 0;
        counts
    }

    /// Number of entities the counts were taken over.
    pub fn total(&self) -> usize {
        self.ok_count + self.late_count + self.stale_count + self.unknown_count + self.suppressed_count
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
