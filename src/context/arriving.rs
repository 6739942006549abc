//! Arriving handler (spec §4.2.3): estimates and finalises arrival.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::events::FlightEvent;
use crate::flight::{Flight, InfoStatus, LatLon};

use super::{EventSink, FlightContextInner, Trigger};

const THEORY_RIPENING_SECONDS: i64 = 10;
const MAX_ETUA_SECONDS: f64 = 600.0;
const CLIMB_RATE_WINDOW: usize = 11; // 10 pairs

pub(super) fn handle(
    inner: &mut FlightContextInner,
    sink: &dyn EventSink,
    aircraft_id: &str,
) -> Option<Trigger> {
    let current = inner.current_position.clone()?;

    if current.altitude > 1000.0 {
        return Some(Trigger::LandingAborted);
    }

    let latest_headings: Vec<f64> = inner
        .flight
        .position_updates
        .iter()
        .rev()
        .filter(|p| p.has_heading())
        .take(5)
        .map(|p| p.heading)
        .collect();

    if latest_headings.is_empty() {
        return None;
    }

    if current.speed == 0.0 {
        let mean = crate::geo::mean_heading(&latest_headings)?;
        inner.flight.end_time = Some(current.timestamp);
        inner.flight.arrival_info_found = InfoStatus::Confirmed;
        inner.flight.arrival_heading = Some(Flight::round_heading(mean));
        inner.flight.arrival_location = Some(LatLon {
            latitude: current.latitude,
            longitude: current.longitude,
        });
        sink.emit(FlightEvent::Landing {
            aircraft_id: aircraft_id.to_string(),
            flight: inner.flight.clone(),
        });
        return Some(Trigger::Arrived);
    }

    if inner.flight.arrival_info_found == InfoStatus::Estimated {
        if let Some(end_time) = inner.flight.end_time {
            if current.timestamp > end_time + ChronoDuration::seconds(THEORY_RIPENING_SECONDS) {
                sink.emit(FlightEvent::Landing {
                    aircraft_id: aircraft_id.to_string(),
                    flight: inner.flight.clone(),
                });
                return Some(Trigger::Arrived);
            }
        }
    }

    let mean_climb_rate = mean_climb_rate(inner)?;
    if mean_climb_rate == 0.0 {
        return None;
    }

    let etua_seconds = current.altitude / mean_climb_rate.abs();
    if !etua_seconds.is_finite() || etua_seconds > MAX_ETUA_SECONDS {
        return None;
    }

    let mean = crate::geo::mean_heading(&latest_headings)?;
    let end_time = current.timestamp + ChronoDuration::milliseconds((etua_seconds * 1000.0) as i64);
    inner.flight.end_time = Some(end_time);
    inner.flight.arrival_info_found = InfoStatus::Estimated;
    inner.flight.arrival_heading = Some(Flight::round_heading(mean));
    schedule_ripening_check(inner, end_time);

    None
}

/// Re-evaluate a ripened estimate without a new sample having arrived
/// (spec §8 scenario 5). Called from the arrival-theory timer.
pub(super) fn finalize_ripened_theory(
    inner: &mut FlightContextInner,
    sink: &dyn EventSink,
    aircraft_id: &str,
) -> Option<Trigger> {
    if inner.flight.arrival_info_found != InfoStatus::Estimated {
        return None;
    }
    sink.emit(FlightEvent::Landing {
        aircraft_id: aircraft_id.to_string(),
        flight: inner.flight.clone(),
    });
    Some(Trigger::Arrived)
}

fn schedule_ripening_check(inner: &mut FlightContextInner, end_time: DateTime<Utc>) {
    inner.pending_arrival_check =
        Some(end_time + ChronoDuration::seconds(THEORY_RIPENING_SECONDS));
}

fn mean_climb_rate(inner: &FlightContextInner) -> Option<f64> {
    let window: Vec<_> = inner
        .flight
        .position_updates
        .iter()
        .rev()
        .take(CLIMB_RATE_WINDOW)
        .collect();

    if window.len() < 2 {
        return None;
    }

    // `window` is newest-first; pair each sample with its predecessor
    // (older sample), matching chronological adjacency.
    let mut rates = Vec::new();
    for pair in window.windows(2) {
        let (newer, older) = (pair[0], pair[1]);
        let dt = (newer.timestamp - older.timestamp).num_milliseconds() as f64 / 1000.0;
        if dt <= 0.0 {
            continue;
        }
        rates.push((newer.altitude - older.altitude) / dt);
    }

    if rates.is_empty() {
        return None;
    }

    Some(rates.iter().sum::<f64>() / rates.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NullSink;
    use crate::position::PositionUpdate;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_inner() -> FlightContextInner {
        FlightContextInner {
            flight: Flight::new("G1"),
            state: super::super::FlightState::Arriving,
            current_position: None,
            last_active: std::time::Instant::now(),
            low_altitude_threshold_meters: 150.0,
            minify_memory_pressure: false,
            first_moving_sample: None,
            arrival_timer: None,
            pending_arrival_check: None,
        }
    }

    #[test]
    fn confirmed_landing_sets_heading_and_location() {
        let mut inner = make_inner();
        for (i, hdg) in [170.0, 175.0, 180.0, 182.0, 178.0].into_iter().enumerate() {
            inner.flight.insert_ordered(PositionUpdate::new(
                "G1",
                ts(i as i64 * 2),
                52.0,
                5.0,
                50.0 - i as f64 * 10.0,
                20.0,
                hdg,
            ));
        }
        let current = PositionUpdate::new("G1", ts(20), 52.01, 5.01, 0.0, 0.0, 180.0);
        inner.flight.insert_ordered(current.clone());
        inner.current_position = Some(current);

        let sink = NullSink;
        let trigger = handle(&mut inner, &sink, "G1");
        assert_eq!(trigger, Some(Trigger::Arrived));
        assert_eq!(inner.flight.arrival_info_found, InfoStatus::Confirmed);
        assert_eq!(inner.flight.arrival_heading, Some(180));
        assert!(inner.flight.arrival_location.is_some());
    }

    #[test]
    fn landing_aborted_above_1000m() {
        let mut inner = make_inner();
        let current = PositionUpdate::new("G1", ts(0), 52.0, 5.0, 1200.0, 40.0, 90.0);
        inner.flight.insert_ordered(current.clone());
        inner.current_position = Some(current);

        let sink = NullSink;
        assert_eq!(
            handle(&mut inner, &sink, "G1"),
            Some(Trigger::LandingAborted)
        );
    }

    #[test]
    fn estimate_schedules_a_ripening_check() {
        let mut inner = make_inner();
        for (i, alt) in [200.0, 150.0, 100.0].into_iter().enumerate() {
            inner.flight.insert_ordered(PositionUpdate::new(
                "G1",
                ts(i as i64 * 10),
                52.0,
                5.0,
                alt,
                20.0,
                180.0,
            ));
        }
        let current = PositionUpdate::new("G1", ts(25), 52.0, 5.0, 90.0, 20.0, 180.0);
        inner.flight.insert_ordered(current.clone());
        inner.current_position = Some(current);

        let sink = NullSink;
        let trigger = handle(&mut inner, &sink, "G1");
        assert_eq!(trigger, None);
        assert_eq!(inner.flight.arrival_info_found, InfoStatus::Estimated);
        assert!(inner.pending_arrival_check.is_some());
    }
}
