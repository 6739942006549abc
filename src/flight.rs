//! The `Flight` aggregate and its supporting types (spec §3).

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::PositionUpdate;

bitflags! {
    /// Candidate/confirmed launch method. Before classification this may
    /// carry several candidate bits at once (`Unknown | Aerotow | Winch |
    /// SelfLaunch`); once classified it holds exactly one of
    /// `{Aerotow, Winch, SelfLaunch}`, optionally combined with `OnTow`/`TowPlane`
    /// to record which side of an aerotow pairing this aircraft was on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LaunchMethod: u8 {
        const NONE      = 0;
        const UNKNOWN   = 1 << 0;
        const AEROTOW   = 1 << 1;
        const WINCH     = 1 << 2;
        const SELF      = 1 << 3;
        const ON_TOW    = 1 << 4;
        const TOW_PLANE = 1 << 5;
    }
}

impl Default for LaunchMethod {
    fn default() -> Self {
        LaunchMethod::NONE
    }
}

impl LaunchMethod {
    /// The full candidate set considered at the start of departure classification.
    pub const CANDIDATES: LaunchMethod = LaunchMethod::UNKNOWN
        .union(LaunchMethod::AEROTOW)
        .union(LaunchMethod::WINCH)
        .union(LaunchMethod::SELF);

    /// `true` once the method carries exactly one of `{AEROTOW, WINCH, SELF}`
    /// and none of the other candidate bits — i.e. classification is final.
    pub fn is_classified(&self) -> bool {
        let resolved = [
            LaunchMethod::AEROTOW,
            LaunchMethod::WINCH,
            LaunchMethod::SELF,
        ];
        let resolved_bits = resolved.iter().filter(|m| self.contains(**m)).count();
        resolved_bits == 1 && !self.contains(LaunchMethod::UNKNOWN)
    }
}

/// Tri-state confidence for a flight's departure/arrival info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InfoStatus {
    #[default]
    Unknown,
    Estimated,
    Confirmed,
}

/// The towing aircraft ("Tug") or the towed glider ("Tow") in an aerotow pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterType {
    Tug,
    Tow,
    None,
}

/// A candidate tow/tug pairing returned by the `AerotowProbe` collaborator (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub other_aircraft_id: String,
    pub kind: EncounterType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A geographic point, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// The mutable per-aircraft flight aggregate (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub aircraft_id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub departure_location: Option<LatLon>,
    pub arrival_location: Option<LatLon>,
    /// `1..=360`; `0` is reserved for "unset".
    pub departure_heading: Option<u16>,
    /// `1..=360`; `0` is reserved for "unset".
    pub arrival_heading: Option<u16>,
    pub departure_info_found: InfoStatus,
    pub arrival_info_found: InfoStatus,
    pub launch_method: LaunchMethod,
    pub launch_finished: Option<DateTime<Utc>>,
    pub encounters: Vec<Encounter>,
    pub position_updates: Vec<PositionUpdate>,
}

impl Flight {
    pub fn new(aircraft_id: impl Into<String>) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            start_time: None,
            end_time: None,
            departure_location: None,
            arrival_location: None,
            departure_heading: None,
            arrival_heading: None,
            departure_info_found: InfoStatus::Unknown,
            arrival_info_found: InfoStatus::Unknown,
            launch_method: LaunchMethod::NONE,
            launch_finished: None,
            encounters: Vec::new(),
            position_updates: Vec::new(),
        }
    }

    /// Insert a report in timestamp order (spec §3: "`positionUpdates` is
    /// sorted by timestamp when observed by a state handler; insertion may
    /// arrive unordered but is normalised before processing"). Returns
    /// `false` without mutating anything if a report with the same identity
    /// (`aircraft_id` + `timestamp`) already occupies that timestamp slot —
    /// re-enqueueing the same report is a no-op (spec §8 idempotency
    /// invariant). Dedup is by identity, not full structural equality:
    /// `speed`/`heading` may be `NaN` (spec §3), and `NaN != NaN` would
    /// otherwise let an identical NaN-bearing report re-insert as a
    /// "new" duplicate every time.
    pub fn insert_ordered(&mut self, update: PositionUpdate) -> bool {
        let start = self
            .position_updates
            .partition_point(|p| p.timestamp < update.timestamp);
        let end = self
            .position_updates
            .partition_point(|p| p.timestamp <= update.timestamp);
        let is_duplicate = self.position_updates[start..end]
            .iter()
            .any(|p| p.aircraft_id == update.aircraft_id && p.timestamp == update.timestamp);
        if is_duplicate {
            return false;
        }
        self.position_updates.insert(end, update);
        true
    }

    /// Drop buffered samples strictly earlier than `cutoff`.
    pub fn drop_before(&mut self, cutoff: DateTime<Utc>) {
        self.position_updates.retain(|p| p.timestamp >= cutoff);
    }

    /// Round a mean heading to the nearest integer in `[1, 360]`, remapping a
    /// computed `0` to `360` per spec §3.
    pub fn round_heading(mean: f64) -> u16 {
        let rounded = mean.round() as i64;
        let wrapped = ((rounded - 1).rem_euclid(360)) + 1;
        wrapped as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn pos(id: &str, secs: i64) -> PositionUpdate {
        PositionUpdate::new(id, ts(secs), 52.0, 5.0, 0.0, 0.0, 0.0)
    }

    #[test]
    fn launch_method_candidates_are_not_classified() {
        assert!(!LaunchMethod::CANDIDATES.is_classified());
        assert!(!LaunchMethod::NONE.is_classified());
    }

    #[test]
    fn launch_method_single_resolved_bit_is_classified() {
        assert!(LaunchMethod::WINCH.is_classified());
        assert!((LaunchMethod::AEROTOW | LaunchMethod::ON_TOW).is_classified());
        assert!(!(LaunchMethod::WINCH | LaunchMethod::SELF).is_classified());
    }

    #[test]
    fn insert_ordered_keeps_ascending_timestamps_regardless_of_arrival_order() {
        let mut flight = Flight::new("G1");
        flight.insert_ordered(pos("G1", 10));
        flight.insert_ordered(pos("G1", 0));
        flight.insert_ordered(pos("G1", 5));

        let timestamps: Vec<_> = flight.position_updates.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![ts(0), ts(5), ts(10)]);
    }

    #[test]
    fn insert_ordered_rejects_exact_duplicate() {
        let mut flight = Flight::new("G1");
        assert!(flight.insert_ordered(pos("G1", 10)));
        assert!(!flight.insert_ordered(pos("G1", 10)));
        assert_eq!(flight.position_updates.len(), 1);
    }

    #[test]
    fn insert_ordered_rejects_duplicate_with_nan_fields() {
        // speed/heading may be NaN (spec §3); dedup must be by identity
        // (aircraft_id + timestamp), not derived equality, or a NaN-bearing
        // report never dedups against itself (NaN != NaN).
        let mut flight = Flight::new("G1");
        let report = PositionUpdate::new("G1", ts(10), 52.0, 5.0, 100.0, f64::NAN, f64::NAN);
        assert!(flight.insert_ordered(report.clone()));
        assert!(!flight.insert_ordered(report));
        assert_eq!(flight.position_updates.len(), 1);
    }

    #[test]
    fn drop_before_removes_strictly_earlier_samples() {
        let mut flight = Flight::new("G1");
        for s in [0, 5, 10, 15] {
            flight.insert_ordered(pos("G1", s));
        }
        flight.drop_before(ts(10));
        let timestamps: Vec<_> = flight.position_updates.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![ts(10), ts(15)]);
    }

    #[test]
    fn round_heading_remaps_zero_to_360() {
        assert_eq!(Flight::round_heading(0.0), 360);
        assert_eq!(Flight::round_heading(360.0), 360);
        assert_eq!(Flight::round_heading(89.6), 90);
        assert_eq!(Flight::round_heading(-1.0), 359);
    }
}
