//! Cruise handler (spec §4.2.4): watches for the start of a landing
//! descent. The exact heuristic is left open by spec.md §9; this crate uses
//! three strictly-decreasing altitudes below a configurable floor, the
//! generalisation of the teacher's `AircraftState::has_five_consecutive_inactive`
//! habit of deciding phase transitions from a short trailing window.

use super::{FlightContextInner, Trigger};

pub(super) fn handle(inner: &mut FlightContextInner) -> Option<Trigger> {
    let recent: Vec<f64> = inner
        .flight
        .position_updates
        .iter()
        .rev()
        .take(3)
        .map(|p| p.altitude)
        .collect();

    if recent.len() < 3 {
        return None;
    }

    let strictly_descending = recent[0] < recent[1] && recent[1] < recent[2];
    let below_floor = recent[0] < inner.low_altitude_threshold_meters;

    if strictly_descending && below_floor {
        Some(Trigger::Landing)
    } else {
        None
    }
}
