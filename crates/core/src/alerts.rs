//! Alert selection for LATE/STALE entities.
//!
//! Pure logic: the caller keeps the [`AlertThrottle`] across sweeps and
//! delivers the returned alerts.

use std::collections::HashMap;

use serde::Serialize;

use crate::diagnosis::{diagnose, CauseCode, DiagnosisThresholds, TechnicalContext};
use crate::health::HealthState;
use crate::mode::ModePolicy;
use crate::snapshot::{EntitySnapshot, Snapshot};
use crate::types::{EntityId, EpochSeconds};

/// At most this many causes are attached to one alert.
pub const MAX_ALERT_CAUSES: usize = 2;

/// Alert severity, derived from the entity's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Entity is LATE.
    Warning,
    /// Entity is STALE.
    Critical,
}

impl AlertLevel {
    fn for_health(health: HealthState) -> Option<Self> {
        match health {
            HealthState::Late => Some(AlertLevel::Warning),
            HealthState::Stale => Some(AlertLevel::Critical),
            HealthState::Ok | HealthState::Unknown => None,
        }
    }
}

/// One entity that should be reported as unhealthy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub entity_id: EntityId,
    pub domain: String,
    pub area_id: Option<String>,
    pub health: HealthState,
    pub level: AlertLevel,
    /// Deliver without sound or priority.
    pub silent: bool,
    pub message: String,
    pub causes: Vec<CauseCode>,
    pub last_event: Option<EpochSeconds>,
    pub raised_at: EpochSeconds,
}

/// Remembers when each entity last alerted to suppress repeats within the
/// throttle window.
#[derive(Debug, Default)]
pub struct AlertThrottle {
    window_secs: f64,
    last_alert: HashMap<EntityId, EpochSeconds>,
}

impl AlertThrottle {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs: window_secs as f64,
            last_alert: HashMap::new(),
        }
    }

    pub fn set_window(&mut self, window_secs: u64) {
        self.window_secs = window_secs as f64;
    }

    /// Returns `true` and records `now` if `entity_id` may alert.
    pub fn should_alert(&mut self, entity_id: &str, now: EpochSeconds) -> bool {
        if let Some(last) = self.last_alert.get(entity_id) {
            if now - last < self.window_secs {
                return false;
            }
        }
        self.last_alert.insert(entity_id.to_string(), now);
        true
    }

    /// Forget an entity, e.g. after it was removed or reset.
    pub fn forget(&mut self, entity_id: &str) {
        self.last_alert.remove(entity_id);
    }

    pub fn clear(&mut self) {
        self.last_alert.clear();
    }
}

/// Select the alerts to raise for `snapshot`.
///
/// Nothing is raised when notifications are disabled or the active mode has
/// alerts off. Suppressed entities never alert. `context` supplies optional
/// technical readings per entity for the cause list.
pub fn evaluate_alerts<F>(
    snapshot: &Snapshot,
    policy: &ModePolicy,
    notifications_enabled: bool,
    throttle: &mut AlertThrottle,
    limits: &DiagnosisThresholds,
    context: F,
) -> Vec<Alert>
where
    F: Fn(&EntitySnapshot) -> Option<TechnicalContext>,
{
    if !notifications_enabled || !policy.alerts_enabled {
        return Vec::new();
    }

    let now = snapshot.generated_at;
    let mut alerts = Vec::new();

    for entity in &snapshot.entities {
        if !entity.is_reportable_problem() {
            continue;
        }
        let Some(level) = AlertLevel::for_health(entity.health) else {
            continue;
        };
        if !throttle.should_alert(&entity.entity_id, now) {
            continue;
        }

        let ctx = context(entity);
        let diagnosis = diagnose(entity, ctx.as_ref(), limits);

        alerts.push(Alert {
            entity_id: entity.entity_id.clone(),
            domain: entity.domain.clone(),
            area_id: entity.area_id.clone(),
            health: entity.health,
            level,
            silent: policy.silent_alerts,
            message: diagnosis.message,
            causes: diagnosis
                .issues
                .iter()
                .take(MAX_ALERT_CAUSES)
                .map(|i| i.cause_code)
                .collect(),
            last_event: entity.stats.last_event,
            raised_at: now,
        });
    }

    alerts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadence::CadenceTracker;
    use crate::entity::TrackedEntity;
    use crate::mode::Mode;
    use crate::snapshot::WarmupLimits;

    const LIMITS: WarmupLimits = WarmupLimits {
        min_events_for_classification: 2,
        min_events_considered_warmed_up: 20,
    };

    fn snapshot_at(now: f64, mode: Mode, ids: &[&str]) -> Snapshot {
        let policy = ModePolicy::for_mode(mode, 2.5);
        let entities = ids
            .iter()
            .map(|id| {
                let mut t = CadenceTracker::new(0.1, 10);
                for ts in [0.0, 30.0, 60.0, 90.0] {
                    t.observe(id, ts, None).unwrap();
                }
                EntitySnapshot::evaluate(
                    now,
                    &TrackedEntity::new(*id),
                    t.state(),
                    Vec::new(),
                    &policy,
                    LIMITS,
                )
            })
            .collect();
        Snapshot::new(now, mode, entities)
    }

    fn run(snapshot: &Snapshot, enabled: bool, throttle: &mut AlertThrottle) -> Vec<Alert> {
        evaluate_alerts(
            snapshot,
            &ModePolicy::for_mode(snapshot.mode, 2.5),
            enabled,
            throttle,
            &DiagnosisThresholds::default(),
            |_| None,
        )
    }

    #[test]
    fn stale_entity_raises_critical_alert() {
        let snap = snapshot_at(250.0, Mode::Normal, &["sensor.motion1"]);
        let alerts = run(&snap, true, &mut AlertThrottle::new(3600));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].causes[0], CauseCode::NotResponding);
        assert!(alerts[0].causes.len() <= MAX_ALERT_CAUSES);
        assert!(!alerts[0].silent);
    }

    #[test]
    fn late_entity_raises_warning() {
        let snap = snapshot_at(190.0, Mode::Normal, &["sensor.motion1"]);
        let alerts = run(&snap, true, &mut AlertThrottle::new(3600));
        assert_eq!(alerts[0].level, AlertLevel::Warning);
    }

    #[test]
    fn healthy_entities_do_not_alert() {
        let snap = snapshot_at(100.0, Mode::Normal, &["sensor.motion1"]);
        assert!(run(&snap, true, &mut AlertThrottle::new(3600)).is_empty());
    }

    #[test]
    fn disabled_notifications_raise_nothing() {
        let snap = snapshot_at(250.0, Mode::Normal, &["sensor.motion1"]);
        assert!(run(&snap, false, &mut AlertThrottle::new(3600)).is_empty());
    }

    #[test]
    fn vacation_mode_raises_nothing() {
        let snap = snapshot_at(10_000.0, Mode::Vacation, &["sensor.temp", "binary_sensor.door"]);
        assert!(run(&snap, true, &mut AlertThrottle::new(3600)).is_empty());
    }

    #[test]
    fn night_mode_alerts_are_silent() {
        let snap = snapshot_at(10_000.0, Mode::Night, &["sensor.temp"]);
        let alerts = run(&snap, true, &mut AlertThrottle::new(3600));
        assert!(alerts[0].silent);
    }

    #[test]
    fn throttle_suppresses_repeats_within_window() {
        let mut throttle = AlertThrottle::new(3600);
        let first = snapshot_at(250.0, Mode::Normal, &["sensor.motion1"]);
        let second = snapshot_at(1_000.0, Mode::Normal, &["sensor.motion1"]);
        let third = snapshot_at(4_000.0, Mode::Normal, &["sensor.motion1"]);

        assert_eq!(run(&first, true, &mut throttle).len(), 1);
        assert!(run(&second, true, &mut throttle).is_empty());
        assert_eq!(run(&third, true, &mut throttle).len(), 1);
    }

    #[test]
    fn forgetting_an_entity_resets_its_throttle() {
        let mut throttle = AlertThrottle::new(3600);
        assert!(throttle.should_alert("sensor.a", 0.0));
        assert!(!throttle.should_alert("sensor.a", 10.0));
        throttle.forget("sensor.a");
        assert!(throttle.should_alert("sensor.a", 20.0));
    }
}
