//! Aerotow handler: watches the paired tow/tug encounter recorded in
//! Departing for release, then hands off to Cruise.
//!
//! spec.md's §4.2 transition table names `Aerotow + LaunchCompleted ->
//! Cruise` but (per its own §9 design notes leaving some heuristics to the
//! implementer) does not describe a dedicated handler for the `Aerotow`
//! state beyond that entry. This crate delegates the release decision back
//! to the same `AerotowProbe` collaborator that started the tow (spec §6
//! already treats it as the sole authority on tow/tug pairings), polling it
//! each intake for the encounter's `endTime` to appear.

use crate::aerotow::{AerotowProbe, NeighborLookup};
use crate::flight::Encounter;

use super::{FlightContextInner, Trigger};

pub(super) fn handle(
    inner: &mut FlightContextInner,
    aircraft_id: &str,
    probe: &dyn AerotowProbe,
    neighbors: &dyn NeighborLookup,
) -> Option<Trigger> {
    let current = inner.current_position.clone()?;
    let other_id = inner.flight.encounters.last()?.other_aircraft_id.clone();

    let snapshot = super::build_flight_snapshot(&inner.flight, &current, aircraft_id);
    let encounters = probe.probe(&snapshot, neighbors);

    let released = encounters
        .iter()
        .find(|e: &&Encounter| e.other_aircraft_id == other_id)
        .is_some_and(|e| e.end_time.is_some());

    if !released {
        return None;
    }

    if let Some(last) = inner.flight.encounters.last_mut() {
        if last.other_aircraft_id == other_id {
            last.end_time = Some(current.timestamp);
        }
    }
    inner.flight.launch_finished = Some(current.timestamp);
    Some(Trigger::LaunchCompleted)
}
