//! Probable-cause inference for a single entity.
//!
//! Pure: the same snapshot and context always produce the same
//! [`Diagnosis`]. The engine returns structured issues; wording for display
//! is left to the presentation layer apart from the description strings.

use serde::{Deserialize, Serialize};

use crate::health::HealthState;
use crate::snapshot::EntitySnapshot;

/// Below this many events a "learning phase" note is emitted.
pub const LEARNING_NOTE_THRESHOLD: u64 = 5;

/// Cadences faster than this are flagged as high-frequency (seconds).
pub const HIGH_FREQUENCY_INTERVAL_SECS: f64 = 60.0;

/// Cadences slower than this are flagged as low-frequency (seconds).
pub const LOW_FREQUENCY_INTERVAL_SECS: f64 = 86_400.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Issue severity. Declared most severe first so sorting puts errors on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Machine-readable cause of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCode {
    NotResponding,
    DelayedReporting,
    LearningPhase,
    HighFrequencySensor,
    LowFrequencySensor,
    BatteryCritical,
    BatteryLow,
    LinkQualityLow,
    SignalLow,
}

impl CauseCode {
    pub fn as_str(self) -> &'static str {
        match self {
            CauseCode::NotResponding => "not_responding",
            CauseCode::DelayedReporting => "delayed_reporting",
            CauseCode::LearningPhase => "learning_phase",
            CauseCode::HighFrequencySensor => "high_frequency_sensor",
            CauseCode::LowFrequencySensor => "low_frequency_sensor",
            CauseCode::BatteryCritical => "battery_critical",
            CauseCode::BatteryLow => "battery_low",
            CauseCode::LinkQualityLow => "link_quality_low",
            CauseCode::SignalLow => "signal_low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub cause_code: CauseCode,
    pub description: String,
}

/// Computed, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    pub message: String,
    /// Errors, then warnings, then info; emission order within a severity.
    pub issues: Vec<Issue>,
}

impl Diagnosis {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}

/// Optional radio/power readings supplied by the host integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalContext {
    /// Battery level in percent.
    #[serde(default)]
    pub battery_level: Option<f64>,
    /// Link quality indicator (Zigbee LQI, 0–255).
    #[serde(default)]
    pub link_quality: Option<f64>,
    /// Received signal strength in dBm.
    #[serde(default)]
    pub signal_strength: Option<f64>,
}

/// Low-water marks for [`TechnicalContext`] readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisThresholds {
    pub battery_critical_percent: f64,
    pub battery_low_percent: f64,
    pub link_quality_low: f64,
    pub signal_low_dbm: f64,
    pub learning_note_threshold: u64,
}

impl Default for DiagnosisThresholds {
    fn default() -> Self {
        Self {
            battery_critical_percent: 5.0,
            battery_low_percent: 20.0,
            link_quality_low: 50.0,
            signal_low_dbm: -80.0,
            learning_note_threshold: LEARNING_NOTE_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Infer probable causes for `entity`'s current health.
///
/// Every applicable category contributes; within a category the first
/// matching rule wins.
pub fn diagnose(
    entity: &EntitySnapshot,
    context: Option<&TechnicalContext>,
    limits: &DiagnosisThresholds,
) -> Diagnosis {
    let mut issues = Vec::new();
    let stats = &entity.stats;

    // Reporting state.
    match entity.health {
        HealthState::Stale => {
            let elapsed = stats
                .age
                .map(format_elapsed)
                .unwrap_or_else(|| "an unknown time".to_string());
            issues.push(Issue {
                severity: Severity::Error,
                cause_code: CauseCode::NotResponding,
                description: format!("Not responding: no event for {elapsed}"),
            });
        }
        HealthState::Late => {
            let expected = stats
                .interval_ewma
                .map(|v| format!(" (usually every {})", format_elapsed(v)))
                .unwrap_or_default();
            issues.push(Issue {
                severity: Severity::Warning,
                cause_code: CauseCode::DelayedReporting,
                description: format!("Delayed reporting{expected}"),
            });
        }
        HealthState::Ok | HealthState::Unknown => {}
    }

    // Learning progress.
    if stats.event_count < limits.learning_note_threshold {
        issues.push(Issue {
            severity: Severity::Info,
            cause_code: CauseCode::LearningPhase,
            description: format!(
                "Learning phase: {} of {} events observed",
                stats.event_count, limits.learning_note_threshold
            ),
        });
    }

    // Cadence character.
    if let Some(ewma) = stats.interval_ewma {
        if ewma < HIGH_FREQUENCY_INTERVAL_SECS {
            issues.push(Issue {
                severity: Severity::Info,
                cause_code: CauseCode::HighFrequencySensor,
                description: format!(
                    "High-frequency sensor (every {}), expected for motion or binary devices",
                    format_elapsed(ewma)
                ),
            });
        } else if ewma > LOW_FREQUENCY_INTERVAL_SECS {
            issues.push(Issue {
                severity: Severity::Info,
                cause_code: CauseCode::LowFrequencySensor,
                description: format!(
                    "Low-frequency sensor (every {}), long silences are normal",
                    format_elapsed(ewma)
                ),
            });
        }
    }

    if let Some(ctx) = context {
        technical_issues(ctx, limits, &mut issues);
    }

    // Stable sort keeps emission order within a severity.
    issues.sort_by_key(|i| i.severity);

    let message = issues
        .first()
        .map(|i| i.description.clone())
        .unwrap_or_else(|| "No issues detected".to_string());

    Diagnosis { message, issues }
}

/// Battery, link-quality and signal checks. Absent readings are skipped.
fn technical_issues(ctx: &TechnicalContext, limits: &DiagnosisThresholds, issues: &mut Vec<Issue>) {
    if let Some(battery) = ctx.battery_level.filter(|v| v.is_finite()) {
        if battery <= limits.battery_critical_percent {
            issues.push(Issue {
                severity: Severity::Error,
                cause_code: CauseCode::BatteryCritical,
                description: format!("Battery critical ({battery:.0}%)"),
            });
        } else if battery <= limits.battery_low_percent {
            issues.push(Issue {
                severity: Severity::Warning,
                cause_code: CauseCode::BatteryLow,
                description: format!("Battery low ({battery:.0}%)"),
            });
        }
    }

    if let Some(lqi) = ctx.link_quality.filter(|v| v.is_finite()) {
        if lqi < limits.link_quality_low {
            issues.push(Issue {
                severity: Severity::Warning,
                cause_code: CauseCode::LinkQualityLow,
                description: format!("Link quality low (LQI {lqi:.0})"),
            });
        }
    }

    if let Some(rssi) = ctx.signal_strength.filter(|v| v.is_finite()) {
        if rssi < limits.signal_low_dbm {
            issues.push(Issue {
                severity: Severity::Warning,
                cause_code: CauseCode::SignalLow,
                description: format!("Signal low ({rssi:.0} dBm)"),
            });
        }
    }
}

/// Human-readable duration, e.g. `45s`, `12m`, `3h 5m`, `2d 4h`.
pub fn format_elapsed(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "an unknown time".to_string();
    }
    let total = secs.round() as u64;
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (minutes, seconds) = (rem / 60, rem % 60);

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{seconds}s")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
