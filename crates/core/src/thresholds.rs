//! Threshold policy: derives the OK/LATE/STALE boundaries from a learned
//! cadence and the active mode.
//!
//! Thresholds are never stored; they are recomputed on every evaluation.

use serde::Serialize;

use crate::cadence::CadenceState;
use crate::mode::ModePolicy;

/// An entity is OK while its silence is shorter than `threshold * 1.1`.
pub const OK_BOUND_FACTOR: f64 = 1.1;

/// An entity is STALE once its silence reaches `threshold * 2.0`.
pub const LATE_BOUND_FACTOR: f64 = 2.0;

/// Classification boundaries for one entity under one mode (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// `interval_ewma * threshold_multiplier`.
    pub threshold: f64,
    /// Silence below this is OK.
    pub ok_bound: f64,
    /// Silence below this (and at or above `ok_bound`) is LATE.
    pub late_bound: f64,
}

impl Thresholds {
    /// Boundaries for an explicit base threshold.
    pub fn from_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            ok_bound: threshold * OK_BOUND_FACTOR,
            late_bound: threshold * LATE_BOUND_FACTOR,
        }
    }
}

/// Compute thresholds for `cadence` under `policy`.
///
/// Returns `None` while no interval has been learned, or when the learned
/// interval is not a usable positive number. Callers must treat `None` as
/// "unknown", never as zero or infinite tolerance.
pub fn thresholds(cadence: &CadenceState, policy: &ModePolicy) -> Option<Thresholds> {
    let ewma = cadence.interval_ewma()?;
    let threshold = ewma * policy.threshold_multiplier;
    if !threshold.is_finite() || threshold <= 0.0 {
        return None;
    }
    Some(Thresholds::from_threshold(threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Mode, ModePolicy};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn undefined_until_interval_learned() {
        let state = CadenceState::from_parts(None, 1, Some(0.0), 0.1);
        let policy = ModePolicy::for_mode(Mode::Normal, 2.5);
        assert!(thresholds(&state, &policy).is_none());
    }

    #[test]
    fn bounds_follow_multiplier() {
        let state = CadenceState::from_parts(Some(30.0), 4, Some(90.0), 0.1);
        let policy = ModePolicy::for_mode(Mode::Normal, 2.5);

        let t = thresholds(&state, &policy).unwrap();

        assert!(approx(t.threshold, 75.0));
        assert!(approx(t.ok_bound, 82.5));
        assert!(approx(t.late_bound, 150.0));
    }

    #[test]
    fn vacation_widens_bounds() {
        let state = CadenceState::from_parts(Some(30.0), 4, Some(90.0), 0.1);
        let normal = thresholds(&state, &ModePolicy::for_mode(Mode::Normal, 2.5)).unwrap();
        let vacation = thresholds(&state, &ModePolicy::for_mode(Mode::Vacation, 2.5)).unwrap();
        assert!(vacation.late_bound > normal.late_bound);
    }

    #[test]
    fn non_positive_average_is_undefined() {
        let state = CadenceState::from_parts(Some(0.0), 4, Some(90.0), 0.1);
        let policy = ModePolicy::for_mode(Mode::Normal, 2.5);
        assert!(thresholds(&state, &policy).is_none());
    }
}
