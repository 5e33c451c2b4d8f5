/// Stable, unique identifier of a monitored entity (e.g. `sensor.kitchen_temp`).
pub type EntityId = String;

/// Event timestamps are fractional seconds since the Unix epoch.
pub type EpochSeconds = f64;

/// All wall-clock timestamps rendered for humans are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current wall-clock time as [`EpochSeconds`].
pub fn now_epoch_seconds() -> EpochSeconds {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Convert [`EpochSeconds`] into a UTC timestamp, if representable.
pub fn to_timestamp(secs: EpochSeconds) -> Option<Timestamp> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0) as u32;
    chrono::DateTime::from_timestamp(whole as i64, nanos)
}

/// Domain part of an entity id (`binary_sensor.door` -> `binary_sensor`).
///
/// Ids without a dot are their own domain.
pub fn domain_of(entity_id: &str) -> &str {
    entity_id.split_once('.').map_or(entity_id, |(domain, _)| domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_prefix_before_first_dot() {
        assert_eq!(domain_of("binary_sensor.front_door"), "binary_sensor");
        assert_eq!(domain_of("sensor.a.b"), "sensor");
        assert_eq!(domain_of("orphan"), "orphan");
    }

    #[test]
    fn timestamp_conversion_keeps_whole_seconds() {
        let ts = to_timestamp(1_700_000_000.5).expect("representable");
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn non_finite_seconds_have_no_timestamp() {
        assert!(to_timestamp(f64::NAN).is_none());
        assert!(to_timestamp(f64::INFINITY).is_none());
    }
}
