//! Operating modes and the fixed policy record each one carries.
//!
//! A mode never touches learned cadence data; it only changes how thresholds
//! are derived and which classifications escalate into alerts.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Threshold multiplier used in vacation mode.
pub const VACATION_THRESHOLD_MULTIPLIER: f64 = 4.0;

/// Threshold multiplier used in night mode.
pub const NIGHT_THRESHOLD_MULTIPLIER: f64 = 2.0;

/// Domains whose reporting cadence depends on human activity. Vacation mode
/// stops escalating them, since nobody is home to trigger them.
pub const VARIABLE_DOMAINS: &[&str] = &["binary_sensor", "device_tracker", "person"];

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The process-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Vacation,
    Night,
}

impl Mode {
    /// Every mode, in declaration order.
    pub const ALL: [Mode; 3] = [Mode::Normal, Mode::Vacation, Mode::Night];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Vacation => "vacation",
            Mode::Night => "night",
        }
    }

    /// Compact discriminant for lock-free storage.
    pub fn as_u8(self) -> u8 {
        match self {
            Mode::Normal => 0,
            Mode::Vacation => 1,
            Mode::Night => 2,
        }
    }

    /// Inverse of [`Mode::as_u8`]; unknown values fall back to normal.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Mode::Vacation,
            2 => Mode::Night,
            _ => Mode::Normal,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Mode::Normal),
            "vacation" => Ok(Mode::Vacation),
            "night" => Ok(Mode::Night),
            other => Err(CoreError::InvalidMode(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ModePolicy
// ---------------------------------------------------------------------------

/// Policy parameters in force while a mode is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModePolicy {
    pub mode: Mode,
    /// Scalar applied to the learned interval to obtain the base threshold.
    pub threshold_multiplier: f64,
    /// Whether LATE/STALE entities raise alerts at all.
    pub alerts_enabled: bool,
    /// Domains excluded from LATE/STALE escalation in this mode.
    pub ignore_variable_domains: BTreeSet<String>,
    /// Whether raised alerts should be delivered without sound/priority.
    pub silent_alerts: bool,
}

impl ModePolicy {
    /// Build the policy for `mode`.
    ///
    /// `normal_multiplier` is the configured `alert_threshold_multiplier`;
    /// only normal mode uses it, the other modes carry fixed multipliers.
    pub fn for_mode(mode: Mode, normal_multiplier: f64) -> Self {
        match mode {
            Mode::Normal => Self {
                mode,
                threshold_multiplier: normal_multiplier,
                alerts_enabled: true,
                ignore_variable_domains: BTreeSet::new(),
                silent_alerts: false,
            },
            Mode::Vacation => Self {
                mode,
                threshold_multiplier: VACATION_THRESHOLD_MULTIPLIER,
                alerts_enabled: false,
                ignore_variable_domains: VARIABLE_DOMAINS.iter().map(|d| d.to_string()).collect(),
                silent_alerts: false,
            },
            Mode::Night => Self {
                mode,
                threshold_multiplier: NIGHT_THRESHOLD_MULTIPLIER,
                alerts_enabled: true,
                ignore_variable_domains: BTreeSet::new(),
                silent_alerts: true,
            },
        }
    }

    /// Whether entities of `domain` are excluded from escalation.
    pub fn ignores_domain(&self, domain: &str) -> bool {
        self.ignore_variable_domains.contains(domain)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_known_modes() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = "party".parse::<Mode>().unwrap_err();
        assert_matches!(err, CoreError::InvalidMode(m) if m == "party");
    }

    #[test]
    fn mode_names_are_case_sensitive() {
        assert!("Normal".parse::<Mode>().is_err());
    }

    #[test]
    fn u8_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_u8(mode.as_u8()), mode);
        }
    }

    #[test]
    fn normal_uses_configured_multiplier() {
        let policy = ModePolicy::for_mode(Mode::Normal, 3.0);
        assert_eq!(policy.threshold_multiplier, 3.0);
        assert!(policy.alerts_enabled);
        assert!(!policy.silent_alerts);
        assert!(policy.ignore_variable_domains.is_empty());
    }

    #[test]
    fn vacation_ignores_variable_domains_and_mutes_alerts() {
        let policy = ModePolicy::for_mode(Mode::Vacation, 2.5);
        assert_eq!(policy.threshold_multiplier, VACATION_THRESHOLD_MULTIPLIER);
        assert!(!policy.alerts_enabled);
        assert!(policy.ignores_domain("binary_sensor"));
        assert!(!policy.ignores_domain("sensor"));
    }

    #[test]
    fn night_is_silent_and_stricter() {
        let policy = ModePolicy::for_mode(Mode::Night, 2.5);
        assert_eq!(policy.threshold_multiplier, NIGHT_THRESHOLD_MULTIPLIER);
        assert!(policy.alerts_enabled);
        assert!(policy.silent_alerts);
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Mode::Vacation).unwrap(), "vacation");
    }
}
