//! Cadence learning: an exponentially-weighted moving average of the interval
//! between consecutive events from one entity.
//!
//! Pure numeric state, no I/O. The caller (the registry) owns one
//! [`CadenceTracker`] per entity and serializes access to it.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

use crate::error::CoreError;
use crate::types::EpochSeconds;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// EWMA smoothing factor α.
///
/// With α = 0.1 the effective averaging span is `2/α - 1 = 19` events, so
/// roughly the last 10–20 intervals dominate the learned cadence.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.1;

/// Number of history entries retained per entity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One observed interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Timestamp of the event that closed the interval.
    pub timestamp: EpochSeconds,
    /// Raw state string carried by the event, if the feed supplied one.
    pub state_value: Option<String>,
    /// Seconds since the previous accepted event.
    pub interval_since_previous: f64,
}

/// Bounded, append-only ring of the most recent [`HistoryEntry`] values.
///
/// Serializes as a plain sequence, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    /// Create an empty history. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// The newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Copy of every retained entry, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

// ---------------------------------------------------------------------------
// CadenceState
// ---------------------------------------------------------------------------

/// Learned cadence of a single entity.
///
/// `interval_ewma` is only ever derived from the delta between two accepted
/// events, never from the current wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadenceState {
    interval_ewma: Option<f64>,
    event_count: u64,
    last_event_timestamp: Option<EpochSeconds>,
    smoothing_factor: f64,
}

impl CadenceState {
    /// Fresh state with no events observed.
    pub fn new(smoothing_factor: f64) -> Self {
        Self {
            interval_ewma: None,
            event_count: 0,
            last_event_timestamp: None,
            smoothing_factor,
        }
    }

    /// Rebuild a state from previously captured parts (e.g. restored by an
    /// external persistence layer). No validation is performed here; use
    /// [`CadenceState::is_consistent`] before trusting it.
    pub fn from_parts(
        interval_ewma: Option<f64>,
        event_count: u64,
        last_event_timestamp: Option<EpochSeconds>,
        smoothing_factor: f64,
    ) -> Self {
        Self {
            interval_ewma,
            event_count,
            last_event_timestamp,
            smoothing_factor,
        }
    }

    pub fn interval_ewma(&self) -> Option<f64> {
        self.interval_ewma
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn last_event_timestamp(&self) -> Option<EpochSeconds> {
        self.last_event_timestamp
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.smoothing_factor
    }

    /// Whether every stored number is usable for classification.
    ///
    /// A state that fails this check is classified as unknown rather than
    /// producing a nonsensical health value.
    pub fn is_consistent(&self) -> bool {
        let ewma_ok = self.interval_ewma.map_or(true, |v| v.is_finite() && v > 0.0);
        let last_ok = self.last_event_timestamp.map_or(true, f64::is_finite);
        let count_ok = match self.last_event_timestamp {
            Some(_) => self.event_count >= 1,
            None => self.event_count == 0 && self.interval_ewma.is_none(),
        };
        ewma_ok && last_ok && count_ok && self.smoothing_factor > 0.0 && self.smoothing_factor < 1.0
    }

    /// Apply the EWMA recurrence for a new accepted interval.
    fn absorb_interval(&mut self, delta: f64) {
        let alpha = self.smoothing_factor;
        self.interval_ewma = Some(match self.interval_ewma {
            None => delta,
            Some(prev) => alpha * delta + (1.0 - alpha) * prev,
        });
    }
}

// ---------------------------------------------------------------------------
// CadenceTracker
// ---------------------------------------------------------------------------

/// Result of feeding one event to a [`CadenceTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// First event ever seen; no interval yet.
    First,
    /// Interval accepted and folded into the average.
    Interval { delta: f64 },
    /// Duplicate or out-of-order event; state left untouched.
    OutOfOrder { delta: f64 },
}

impl Observation {
    /// Whether the event changed the tracker.
    pub fn accepted(&self) -> bool {
        !matches!(self, Observation::OutOfOrder { .. })
    }
}

/// Cadence state plus its bounded interval history.
#[derive(Debug, Clone)]
pub struct CadenceTracker {
    state: CadenceState,
    history: History,
}

impl CadenceTracker {
    pub fn new(smoothing_factor: f64, history_capacity: usize) -> Self {
        Self {
            state: CadenceState::new(smoothing_factor),
            history: History::new(history_capacity),
        }
    }

    /// Wrap an existing state (history starts empty).
    pub fn with_state(state: CadenceState, history_capacity: usize) -> Self {
        Self {
            state,
            history: History::new(history_capacity),
        }
    }

    pub fn state(&self) -> &CadenceState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Record a new event.
    ///
    /// Returns [`CoreError::MalformedEvent`] for timestamps that are not
    /// finite or are negative. A non-positive delta against the previous
    /// accepted event is reported as [`Observation::OutOfOrder`] and leaves
    /// the average, count and last timestamp untouched.
    pub fn observe(
        &mut self,
        entity_id: &str,
        timestamp: EpochSeconds,
        state_value: Option<String>,
    ) -> Result<Observation, CoreError> {
        validate_timestamp(entity_id, timestamp)?;

        let Some(last) = self.state.last_event_timestamp else {
            self.state.last_event_timestamp = Some(timestamp);
            self.state.event_count = 1;
            return Ok(Observation::First);
        };

        let delta = timestamp - last;
        if delta <= 0.0 {
            return Ok(Observation::OutOfOrder { delta });
        }

        self.state.absorb_interval(delta);
        self.history.push(HistoryEntry {
            timestamp,
            state_value,
            interval_since_previous: delta,
        });
        self.state.event_count += 1;
        self.state.last_event_timestamp = Some(timestamp);

        Ok(Observation::Interval { delta })
    }
}

/// Reject timestamps that cannot come from a real event.
pub fn validate_timestamp(entity_id: &str, timestamp: EpochSeconds) -> Result<(), CoreError> {
    if !timestamp.is_finite() {
        return Err(CoreError::MalformedEvent {
            entity_id: entity_id.to_string(),
            reason: format!("timestamp is not a finite number: {timestamp}"),
        });
    }
    if timestamp < 0.0 {
        return Err(CoreError::MalformedEvent {
            entity_id: entity_id.to_string(),
            reason: format!("timestamp is negative: {timestamp}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn tracker() -> CadenceTracker {
        CadenceTracker::new(DEFAULT_SMOOTHING_FACTOR, DEFAULT_HISTORY_CAPACITY)
    }

    fn feed(t: &mut CadenceTracker, timestamps: &[f64]) {
        for ts in timestamps {
            t.observe("sensor.test", *ts, None).expect("valid timestamp");
        }
    }

    // -- first event ----------------------------------------------------------

    #[test]
    fn first_event_sets_count_without_interval() {
        let mut t = tracker();
        let obs = t.observe("sensor.test", 100.0, None).unwrap();

        assert_eq!(obs, Observation::First);
        assert_eq!(t.state().event_count(), 1);
        assert_eq!(t.state().last_event_timestamp(), Some(100.0));
        assert!(t.state().interval_ewma().is_none());
        assert!(t.history().is_empty());
    }

    // -- EWMA recurrence ------------------------------------------------------

    #[test]
    fn second_event_seeds_average_with_raw_delta() {
        let mut t = tracker();
        feed(&mut t, &[0.0, 42.0]);
        assert_eq!(t.state().interval_ewma(), Some(42.0));
    }

    #[test]
    fn constant_cadence_learns_exact_interval() {
        let mut t = tracker();
        feed(&mut t, &[0.0, 30.0, 60.0, 90.0]);

        assert_eq!(t.state().event_count(), 4);
        let ewma = t.state().interval_ewma().unwrap();
        assert!((ewma - 30.0).abs() < 1e-9);
    }

    #[test]
    fn average_matches_recurrence_over_deltas() {
        let timestamps = [0.0, 10.0, 40.0, 45.0, 105.0, 106.5];
        let mut t = tracker();
        feed(&mut t, &timestamps);

        let alpha = DEFAULT_SMOOTHING_FACTOR;
        let mut expected: Option<f64> = None;
        for w in timestamps.windows(2) {
            let d = w[1] - w[0];
            expected = Some(match expected {
                None => d,
                Some(prev) => alpha * d + (1.0 - alpha) * prev,
            });
        }

        let got = t.state().interval_ewma().unwrap();
        assert!((got - expected.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn batching_does_not_change_result() {
        let timestamps = [5.0, 17.0, 29.5, 80.0, 81.0];

        let mut one = tracker();
        feed(&mut one, &timestamps);

        let mut split = tracker();
        feed(&mut split, &timestamps[..2]);
        feed(&mut split, &timestamps[2..]);

        assert_eq!(one.state(), split.state());
    }

    // -- rejection ------------------------------------------------------------

    #[test]
    fn duplicate_timestamp_is_noop() {
        let mut t = tracker();
        feed(&mut t, &[0.0, 30.0]);
        let before = t.state().clone();

        let obs = t.observe("sensor.test", 30.0, None).unwrap();

        assert_eq!(obs, Observation::OutOfOrder { delta: 0.0 });
        assert!(!obs.accepted());
        assert_eq!(t.state(), &before);
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn older_timestamp_is_noop() {
        let mut t = tracker();
        feed(&mut t, &[0.0, 30.0, 60.0]);
        let before = t.state().clone();

        let obs = t.observe("sensor.test", 45.0, None).unwrap();

        assert_matches!(obs, Observation::OutOfOrder { delta } if delta < 0.0);
        assert_eq!(t.state(), &before);
    }

    #[test]
    fn non_finite_timestamp_is_malformed() {
        let mut t = tracker();
        let err = t.observe("sensor.test", f64::NAN, None).unwrap_err();
        assert_matches!(err, CoreError::MalformedEvent { .. });
        assert_eq!(t.state().event_count(), 0);
    }

    #[test]
    fn negative_timestamp_is_malformed() {
        let mut t = tracker();
        let err = t.observe("sensor.test", -1.0, None).unwrap_err();
        assert_matches!(err, CoreError::MalformedEvent { entity_id, .. } if entity_id == "sensor.test");
    }

    // -- history --------------------------------------------------------------

    #[test]
    fn history_evicts_oldest_on_overflow() {
        let mut t = CadenceTracker::new(DEFAULT_SMOOTHING_FACTOR, 3);
        feed(&mut t, &[0.0, 1.0, 3.0, 6.0, 10.0]);

        let intervals: Vec<f64> = t
            .history()
            .iter()
            .map(|e| e.interval_since_previous)
            .collect();
        assert_eq!(intervals, vec![2.0, 3.0, 4.0]);
        assert_eq!(t.history().capacity(), 3);
    }

    #[test]
    fn history_keeps_state_value() {
        let mut t = tracker();
        t.observe("sensor.test", 0.0, Some("on".into())).unwrap();
        t.observe("sensor.test", 5.0, Some("off".into())).unwrap();

        let entry = t.history().iter().next().unwrap();
        assert_eq!(entry.state_value.as_deref(), Some("off"));
        assert_eq!(entry.timestamp, 5.0);
    }

    #[test]
    fn recent_returns_newest_entries_oldest_first() {
        let mut h = History::new(5);
        for i in 1..=5 {
            h.push(HistoryEntry {
                timestamp: f64::from(i),
                state_value: None,
                interval_since_previous: 1.0,
            });
        }
        let recent: Vec<f64> = h.recent(2).iter().map(|e| e.timestamp).collect();
        assert_eq!(recent, vec![4.0, 5.0]);
        assert_eq!(h.recent(50).len(), 5);
    }

    #[test]
    fn history_serializes_as_sequence() {
        let mut t = tracker();
        feed(&mut t, &[0.0, 2.0]);
        let json = serde_json::to_value(t.history()).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["interval_since_previous"], 2.0);
    }

    // -- consistency ----------------------------------------------------------

    #[test]
    fn fresh_and_learned_states_are_consistent() {
        let mut t = tracker();
        assert!(t.state().is_consistent());
        feed(&mut t, &[0.0, 10.0]);
        assert!(t.state().is_consistent());
    }

    #[test]
    fn corrupted_states_are_detected() {
        let nan_ewma = CadenceState::from_parts(Some(f64::NAN), 3, Some(10.0), 0.1);
        let zero_ewma = CadenceState::from_parts(Some(0.0), 3, Some(10.0), 0.1);
        let inf_last = CadenceState::from_parts(Some(5.0), 3, Some(f64::INFINITY), 0.1);
        let bad_alpha = CadenceState::from_parts(Some(5.0), 3, Some(10.0), 1.5);

        assert!(!nan_ewma.is_consistent());
        assert!(!zero_ewma.is_consistent());
        assert!(!inf_last.is_consistent());
        assert!(!bad_alpha.is_consistent());
    }
}
