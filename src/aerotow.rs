//! The `isAerotow` external collaborator (spec §6), expressed as a trait
//! seam rather than a free function — the teacher's
//! `towing::find_nearby_gliders`/`check_tow_release` take a state and the
//! shared `AircraftStatesMap` as plain parameters; here the factory is
//! generic over the collaborator so a consumer can plug in their own
//! proximity/synchronised-climb detector, or opt out entirely via
//! `NoopAerotowProbe` when `Options.nearby_runtime` is `false`.

use chrono::{DateTime, Utc};

use crate::flight::{Encounter, LatLon};
use crate::position::PositionUpdate;

/// A read-only view of one context's current flight, as exposed to the
/// collaborator. Deliberately narrower than `FlightContext` itself — the
/// probe should only see what it needs to decide on a pairing.
#[derive(Debug, Clone)]
pub struct FlightSnapshot {
    pub aircraft_id: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub current_position: Option<PositionUpdate>,
    pub recent_positions: Vec<PositionUpdate>,
}

impl FlightSnapshot {
    pub fn current_location(&self) -> Option<LatLon> {
        self.current_position.as_ref().map(|p| LatLon {
            latitude: p.latitude,
            longitude: p.longitude,
        })
    }
}

/// What the probe is allowed to see of the rest of the tracked set.
/// Grounded on the teacher passing `&AircraftStatesMap` into
/// `find_nearby_gliders`, narrowed here to an explicit trait so the factory
/// doesn't have to expose its internal map type.
pub trait NeighborLookup: Send + Sync {
    /// Snapshots of every other currently-tracked aircraft, excluding `self_id`.
    fn neighbors(&self, self_id: &str) -> Vec<FlightSnapshot>;
}

/// `isAerotow(context) -> Vec<Encounter>` as a trait.
pub trait AerotowProbe: Send + Sync {
    fn probe(&self, ctx: &FlightSnapshot, neighbors: &dyn NeighborLookup) -> Vec<Encounter>;
}

/// Used when `Options.nearby_runtime` is `false`: aerotow is never detected,
/// and the Departing handler falls through to winch/self-launch classification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAerotowProbe;

impl AerotowProbe for NoopAerotowProbe {
    fn probe(&self, _ctx: &FlightSnapshot, _neighbors: &dyn NeighborLookup) -> Vec<Encounter> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyNeighbors;
    impl NeighborLookup for EmptyNeighbors {
        fn neighbors(&self, _self_id: &str) -> Vec<FlightSnapshot> {
            Vec::new()
        }
    }

    #[test]
    fn noop_probe_always_returns_empty() {
        let snapshot = FlightSnapshot {
            aircraft_id: "G1".into(),
            departure_time: None,
            current_position: None,
            recent_positions: Vec::new(),
        };
        let probe = NoopAerotowProbe;
        assert!(probe.probe(&snapshot, &EmptyNeighbors).is_empty());
    }
}
