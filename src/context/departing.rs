//! Departing handler (spec §4.2.2): classifies launch method via heading
//! acquisition, an external aerotow probe, and a natural cubic spline fit
//! of the climb.

use chrono::Duration as ChronoDuration;

use crate::aerotow::{AerotowProbe, NeighborLookup};
use crate::flight::{EncounterType, Flight, LatLon, LaunchMethod};
use crate::spline::CubicSpline;

use super::{FlightContextInner, Trigger};

const DEBOUNCE_SECONDS: i64 = 10;
const SINK_CHECK_METERS: f64 = 3.0;
const WINCH_MAX_HEADING_ERROR_DEGREES: f64 = 20.0;
const WINCH_MAX_DISPLACEMENT_METERS: f64 = 3000.0;

pub(super) fn handle(
    inner: &mut FlightContextInner,
    aircraft_id: &str,
    probe: &dyn AerotowProbe,
    neighbors: &dyn NeighborLookup,
) -> Option<Trigger> {
    let current = inner.current_position.clone()?;

    if inner.flight.launch_method == LaunchMethod::NONE {
        acquire_heading(inner)?;
    }

    if let Some(start) = inner.flight.start_time {
        let first_moving = inner.first_moving_sample.unwrap_or(start);
        if current.timestamp - first_moving < ChronoDuration::seconds(DEBOUNCE_SECONDS) {
            return None;
        }
    }

    if inner.flight.launch_method.contains(LaunchMethod::AEROTOW) {
        let snapshot = super::build_flight_snapshot(&inner.flight, &current, aircraft_id);
        let encounters = probe.probe(&snapshot, neighbors);
        if let Some(encounter) = encounters
            .iter()
            .find(|e| matches!(e.kind, EncounterType::Tug | EncounterType::Tow))
        {
            let side = match encounter.kind {
                EncounterType::Tug => LaunchMethod::ON_TOW,
                _ => LaunchMethod::TOW_PLANE,
            };
            inner.flight.launch_method = LaunchMethod::AEROTOW | side;
            inner.flight.encounters.push(encounter.clone());
            return Some(Trigger::TrackAerotow);
        }
        inner.flight.launch_method.remove(LaunchMethod::AEROTOW);
    }

    if !inner.flight.launch_method.contains(LaunchMethod::AEROTOW) && sustained_sink(&inner.flight, &current) {
        return Some(Trigger::Landing);
    }

    if inner.flight.launch_method.contains(LaunchMethod::WINCH) {
        match classify_winch(inner, &current) {
            WinchOutcome::Accepted => {
                inner.flight.launch_finished = Some(current.timestamp);
                inner.flight.launch_method = LaunchMethod::WINCH;
                return Some(Trigger::LaunchCompleted);
            }
            WinchOutcome::Rejected => {
                inner.flight.launch_method.remove(LaunchMethod::WINCH);
            }
            WinchOutcome::StillClimbing | WinchOutcome::InsufficientData => return None,
        }
    }

    if inner.flight.launch_method.contains(LaunchMethod::SELF) {
        inner.flight.launch_finished = Some(current.timestamp);
        inner.flight.launch_method = LaunchMethod::SELF;
        return Some(Trigger::LaunchCompleted);
    }

    None
}

/// `Some(())` once heading acquisition has completed; `None` means "not
/// enough data yet, wait for more samples" and the caller should return.
fn acquire_heading(inner: &mut FlightContextInner) -> Option<()> {
    let headed: Vec<_> = inner
        .flight
        .position_updates
        .iter()
        .filter(|p| p.has_heading())
        .take(5)
        .cloned()
        .collect();

    if headed.len() < 5 {
        return None;
    }

    let mean = crate::geo::mean_heading(&headed.iter().map(|p| p.heading).collect::<Vec<_>>())?;
    inner.flight.departure_heading = Some(Flight::round_heading(mean));
    inner.flight.departure_location = Some(LatLon {
        latitude: headed[0].latitude,
        longitude: headed[0].longitude,
    });
    inner.flight.launch_method = LaunchMethod::CANDIDATES;
    Some(())
}

/// Abort-of-departure sink check (spec §4.2.2). A single-sample altitude
/// drop also happens at the apex of a perfectly normal ballistic climb (the
/// winch spline derivative crosses zero there too), so a one-step comparison
/// can't tell a genuine sink from that rollover. Requires two consecutive
/// drops past `SINK_CHECK_METERS` before calling it a sink, which the apex
/// (one drop, then the climb's own classification takes over) never
/// triggers but a real aborted departure does.
fn sustained_sink(flight: &Flight, current: &crate::position::PositionUpdate) -> bool {
    let Some(idx) = flight.position_updates.iter().rposition(|p| p == current) else {
        return false;
    };
    if idx < 2 {
        return false;
    }
    let prev1 = &flight.position_updates[idx - 1];
    let prev2 = &flight.position_updates[idx - 2];
    prev2.altitude > prev1.altitude + SINK_CHECK_METERS
        && prev1.altitude > current.altitude + SINK_CHECK_METERS
}

enum WinchOutcome {
    Accepted,
    Rejected,
    StillClimbing,
    InsufficientData,
}

fn classify_winch(
    inner: &FlightContextInner,
    current: &crate::position::PositionUpdate,
) -> WinchOutcome {
    let Some(start) = inner.flight.start_time else {
        return WinchOutcome::InsufficientData;
    };

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for p in &inner.flight.position_updates {
        let t = (p.timestamp - start).num_milliseconds() as f64 / 1000.0;
        if xs.last().is_some_and(|&last: &f64| last >= t) {
            continue;
        }
        xs.push(t);
        ys.push(p.altitude);
    }

    let Ok(spline) = CubicSpline::fit(&xs, &ys) else {
        return WinchOutcome::InsufficientData;
    };

    let t_now = (current.timestamp - start).num_milliseconds() as f64 / 1000.0;
    if spline.df(t_now) >= 0.0 {
        return WinchOutcome::StillClimbing;
    }

    let headings: Vec<f64> = inner
        .flight
        .position_updates
        .iter()
        .filter(|p| p.heading != 0.0 && !p.heading.is_nan())
        .map(|p| p.heading)
        .collect();
    let Some(mean) = crate::geo::mean_heading(&headings) else {
        return WinchOutcome::Rejected;
    };

    let heading_diverges = headings
        .iter()
        .any(|h| crate::geo::heading_error(mean, *h) > WINCH_MAX_HEADING_ERROR_DEGREES);

    let first = &inner.flight.position_updates[0];
    let displacement = crate::geo::distance(
        first.latitude,
        first.longitude,
        current.latitude,
        current.longitude,
    );

    if heading_diverges || displacement > WINCH_MAX_DISPLACEMENT_METERS {
        WinchOutcome::Rejected
    } else {
        WinchOutcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::PositionUpdate;
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn flight_with_altitudes(altitudes: &[f64]) -> Flight {
        let mut flight = Flight::new("G1");
        for (i, alt) in altitudes.iter().enumerate() {
            flight.insert_ordered(PositionUpdate::new(
                "G1",
                ts(i as i64 * 2),
                52.0,
                5.0,
                *alt,
                60.0,
                90.0,
            ));
        }
        flight
    }

    #[test]
    fn single_drop_at_a_climb_apex_is_not_a_sink() {
        // 340 -> 360 -> 355: one step down off the peak, the same shape the
        // winch spline derivative test needs to see to classify the launch.
        let flight = flight_with_altitudes(&[340.0, 360.0, 355.0]);
        let current = flight.position_updates.last().unwrap().clone();
        assert!(!sustained_sink(&flight, &current));
    }

    #[test]
    fn two_consecutive_drops_are_a_sink() {
        let flight = flight_with_altitudes(&[360.0, 355.0, 330.0]);
        let current = flight.position_updates.last().unwrap().clone();
        assert!(sustained_sink(&flight, &current));
    }

    #[test]
    fn insufficient_history_is_not_a_sink() {
        let flight = flight_with_altitudes(&[360.0, 330.0]);
        let current = flight.position_updates.last().unwrap().clone();
        assert!(!sustained_sink(&flight, &current));
    }
}

