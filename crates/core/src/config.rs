//! Engine configuration: user-facing options plus the internal learning
//! constants, with range validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cadence::{DEFAULT_HISTORY_CAPACITY, DEFAULT_SMOOTHING_FACTOR};
use crate::diagnosis::{DiagnosisThresholds, LEARNING_NOTE_THRESHOLD};
use crate::error::CoreError;
use crate::health::MIN_EVENTS_FOR_CLASSIFICATION;
use crate::snapshot::WarmupLimits;

pub const MIN_CHECK_EVERY_MINUTES: u64 = 5;
pub const MAX_CHECK_EVERY_MINUTES: u64 = 60;
pub const MIN_ALERT_THRESHOLD_MULTIPLIER: f64 = 1.5;
pub const MAX_ALERT_THRESHOLD_MULTIPLIER: f64 = 5.0;

/// Largest accepted per-entity history ring.
pub const MAX_HISTORY_CAPACITY: usize = 1000;

/// Events after which an entity's learning is considered complete.
pub const MIN_EVENTS_CONSIDERED_WARMED_UP: u64 = 20;

/// Minimum time between two alerts for the same entity.
pub const DEFAULT_ALERT_THROTTLE_SECS: u64 = 3600;

pub const DEFAULT_MAX_TRACKED_ENTITIES: usize = 10_000;
pub const MAX_TRACKED_ENTITIES_LIMIT: usize = 100_000;

/// Runtime configuration of the monitoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minutes between evaluation sweeps, in [5, 60].
    pub check_every_minutes: u64,
    /// Normal-mode threshold multiplier, in [1.5, 5.0].
    pub alert_threshold_multiplier: f64,
    pub enable_notifications: bool,
    /// EWMA smoothing factor, in (0, 1).
    pub smoothing_factor: f64,
    /// Per-entity history ring size. Applies to entities registered after
    /// the change.
    pub history_capacity: usize,
    pub min_events_for_classification: u64,
    pub learning_note_threshold: u64,
    pub min_events_considered_warmed_up: u64,
    pub alert_throttle_secs: u64,
    /// Registry size limit; the least recently active entity is evicted
    /// beyond it.
    pub max_tracked_entities: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_every_minutes: 15,
            alert_threshold_multiplier: 2.5,
            enable_notifications: true,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            min_events_for_classification: MIN_EVENTS_FOR_CLASSIFICATION,
            learning_note_threshold: LEARNING_NOTE_THRESHOLD,
            min_events_considered_warmed_up: MIN_EVENTS_CONSIDERED_WARMED_UP,
            alert_throttle_secs: DEFAULT_ALERT_THROTTLE_SECS,
            max_tracked_entities: DEFAULT_MAX_TRACKED_ENTITIES,
        }
    }
}

impl MonitorConfig {
    /// Load overrides from environment variables on top of the defaults.
    ///
    /// | Env Var                          | Default |
    /// |----------------------------------|---------|
    /// | `LSG_CHECK_EVERY_MINUTES`        | `15`    |
    /// | `LSG_ALERT_THRESHOLD_MULTIPLIER` | `2.5`   |
    /// | `LSG_ENABLE_NOTIFICATIONS`       | `true`  |
    /// | `LSG_SMOOTHING_FACTOR`           | `0.1`   |
    /// | `LSG_HISTORY_CAPACITY`           | `10`    |
    /// | `LSG_MAX_TRACKED_ENTITIES`       | `10000` |
    ///
    /// Unparseable or out-of-range values are reported as
    /// [`CoreError::Validation`]; the caller decides whether to fall back.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`MonitorConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("LSG_CHECK_EVERY_MINUTES") {
            config.check_every_minutes = parse_var("LSG_CHECK_EVERY_MINUTES", &v)?;
        }
        if let Some(v) = lookup("LSG_ALERT_THRESHOLD_MULTIPLIER") {
            config.alert_threshold_multiplier = parse_var("LSG_ALERT_THRESHOLD_MULTIPLIER", &v)?;
        }
        if let Some(v) = lookup("LSG_ENABLE_NOTIFICATIONS") {
            config.enable_notifications = parse_var("LSG_ENABLE_NOTIFICATIONS", &v)?;
        }
        if let Some(v) = lookup("LSG_SMOOTHING_FACTOR") {
            config.smoothing_factor = parse_var("LSG_SMOOTHING_FACTOR", &v)?;
        }
        if let Some(v) = lookup("LSG_HISTORY_CAPACITY") {
            config.history_capacity = parse_var("LSG_HISTORY_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("LSG_MAX_TRACKED_ENTITIES") {
            config.max_tracked_entities = parse_var("LSG_MAX_TRACKED_ENTITIES", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every option against its allowed range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(MIN_CHECK_EVERY_MINUTES..=MAX_CHECK_EVERY_MINUTES).contains(&self.check_every_minutes) {
            return Err(CoreError::Validation(format!(
                "check_every_minutes must be between {MIN_CHECK_EVERY_MINUTES} and \
                 {MAX_CHECK_EVERY_MINUTES}, got {}",
                self.check_every_minutes
            )));
        }
        if !(MIN_ALERT_THRESHOLD_MULTIPLIER..=MAX_ALERT_THRESHOLD_MULTIPLIER)
            .contains(&self.alert_threshold_multiplier)
        {
            return Err(CoreError::Validation(format!(
                "alert_threshold_multiplier must be between {MIN_ALERT_THRESHOLD_MULTIPLIER} and \
                 {MAX_ALERT_THRESHOLD_MULTIPLIER}, got {}",
                self.alert_threshold_multiplier
            )));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor < 1.0) {
            return Err(CoreError::Validation(format!(
                "smoothing_factor must be strictly between 0 and 1, got {}",
                self.smoothing_factor
            )));
        }
        if self.history_capacity == 0 || self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(CoreError::Validation(format!(
                "history_capacity must be between 1 and {MAX_HISTORY_CAPACITY}, got {}",
                self.history_capacity
            )));
        }
        if self.max_tracked_entities == 0 || self.max_tracked_entities > MAX_TRACKED_ENTITIES_LIMIT {
            return Err(CoreError::Validation(format!(
                "max_tracked_entities must be between 1 and {MAX_TRACKED_ENTITIES_LIMIT}, got {}",
                self.max_tracked_entities
            )));
        }
        if self.min_events_for_classification < 2 {
            return Err(CoreError::Validation(
                "min_events_for_classification must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_every_minutes * 60)
    }

    pub fn warmup_limits(&self) -> WarmupLimits {
        WarmupLimits {
            min_events_for_classification: self.min_events_for_classification,
            min_events_considered_warmed_up: self.min_events_considered_warmed_up,
        }
    }

    pub fn diagnosis_thresholds(&self) -> DiagnosisThresholds {
        DiagnosisThresholds {
            learning_note_threshold: self.learning_note_threshold,
            ..DiagnosisThresholds::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Validation(format!("{key} has an invalid value: \"{value}\"")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_every_minutes, 15);
        assert_eq!(config.alert_threshold_multiplier, 2.5);
        assert!(config.enable_notifications);
        assert_eq!(config.check_interval(), Duration::from_secs(900));
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        let mut config = MonitorConfig::default();
        config.check_every_minutes = 5;
        assert!(config.validate().is_ok());
        config.check_every_minutes = 60;
        assert!(config.validate().is_ok());
        config.check_every_minutes = 4;
        assert_matches!(config.validate(), Err(CoreError::Validation(_)));
        config.check_every_minutes = 61;
        assert!(config.validate().is_err());
    }

    #[test]
    fn multiplier_out_of_range_is_rejected() {
        let mut config = MonitorConfig::default();
        config.alert_threshold_multiplier = 1.4;
        assert!(config.validate().is_err());
        config.alert_threshold_multiplier = 5.1;
        assert!(config.validate().is_err());
        config.alert_threshold_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn smoothing_factor_is_exclusive() {
        let mut config = MonitorConfig::default();
        config.smoothing_factor = 0.0;
        assert!(config.validate().is_err());
        config.smoothing_factor = 1.0;
        assert!(config.validate().is_err());
        config.smoothing_factor = 0.3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tracked_entity_limit_is_bounded() {
        let mut config = MonitorConfig::default();
        config.max_tracked_entities = 0;
        assert_matches!(config.validate(), Err(CoreError::Validation(msg)) if msg.contains("max_tracked_entities"));
        config.max_tracked_entities = MAX_TRACKED_ENTITIES_LIMIT + 1;
        assert!(config.validate().is_err());
        config.max_tracked_entities = 1;
        assert!(config.validate().is_ok());

        let config =
            MonitorConfig::from_lookup(lookup(&[("LSG_MAX_TRACKED_ENTITIES", "500")])).unwrap();
        assert_eq!(config.max_tracked_entities, 500);
    }

    #[test]
    fn env_overrides_defaults() {
        let config = MonitorConfig::from_lookup(lookup(&[
            ("LSG_CHECK_EVERY_MINUTES", "30"),
            ("LSG_ALERT_THRESHOLD_MULTIPLIER", "3.0"),
            ("LSG_ENABLE_NOTIFICATIONS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.check_every_minutes, 30);
        assert_eq!(config.alert_threshold_multiplier, 3.0);
        assert!(!config.enable_notifications);
        assert_eq!(config.smoothing_factor, DEFAULT_SMOOTHING_FACTOR);
    }

    #[test]
    fn env_garbage_is_a_validation_error() {
        let err = MonitorConfig::from_lookup(lookup(&[("LSG_HISTORY_CAPACITY", "lots")])).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("LSG_HISTORY_CAPACITY"));
    }

    #[test]
    fn env_out_of_range_is_rejected() {
        let result = MonitorConfig::from_lookup(lookup(&[("LSG_CHECK_EVERY_MINUTES", "1")]));
        assert!(result.is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"check_every_minutes": 10}"#).unwrap();
        assert_eq!(config.check_every_minutes, 10);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }
}
