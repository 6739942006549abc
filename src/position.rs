//! The external input type: an immutable position sample for one aircraft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One position report for a single aircraft.
///
/// Constructed by the caller from whatever wire format they use — the wire
/// parser is an external collaborator (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub aircraft_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Metres, AGL or MSL as supplied by the caller — this crate does not convert.
    pub altitude: f64,
    /// Knots. May be `NaN` if unknown.
    pub speed: f64,
    /// Degrees 0-360. `0` doubles as "unknown/at rest". May be `NaN`.
    pub heading: f64,
}

impl PositionUpdate {
    pub fn new(
        aircraft_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        speed: f64,
        heading: f64,
    ) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            timestamp,
            latitude,
            longitude,
            altitude,
            speed,
            heading,
        }
    }

    pub fn has_heading(&self) -> bool {
        self.heading != 0.0 && !self.heading.is_nan()
    }

    pub fn is_stationary(&self) -> bool {
        self.speed == 0.0 || self.speed.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn has_heading_rejects_zero_and_nan() {
        let mut p = PositionUpdate::new("G1", ts(0), 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(!p.has_heading());
        p.heading = f64::NAN;
        assert!(!p.has_heading());
        p.heading = 90.0;
        assert!(p.has_heading());
    }

    #[test]
    fn is_stationary_treats_nan_speed_as_stationary() {
        let mut p = PositionUpdate::new("G1", ts(0), 0.0, 0.0, 0.0, f64::NAN, 0.0);
        assert!(p.is_stationary());
        p.speed = 35.0;
        assert!(!p.is_stationary());
    }
}
