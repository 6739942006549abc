//! Stationary handler (spec §4.2.1): detects the start of motion and
//! estimates where the flight actually began.

use crate::events::FlightEvent;
use crate::flight::InfoStatus;

use super::{EventSink, FlightContextInner, Trigger, MOVING_SPEED_THRESHOLD_KNOTS};

pub(super) fn handle(
    inner: &mut FlightContextInner,
    sink: &dyn EventSink,
    aircraft_id: &str,
) -> Option<Trigger> {
    let current = inner.current_position.clone()?;

    if current.speed <= MOVING_SPEED_THRESHOLD_KNOTS {
        inner.state = super::FlightState::Stationary;
        return None;
    }

    // Walk backwards over the buffer (excluding `current`, already inserted)
    // to the latest prior sample at rest.
    let prior_rest = inner
        .flight
        .position_updates
        .iter()
        .rev()
        .skip(1)
        .find(|p| p.speed == 0.0 || p.speed.is_nan());

    match prior_rest {
        Some(rest) => {
            let start_time = rest.timestamp;
            inner.flight.start_time = Some(start_time);
            inner.flight.drop_before(start_time);
            inner.flight.departure_info_found = InfoStatus::Estimated;
        }
        None if current.altitude > 1000.0 => {
            inner.flight.departure_info_found = InfoStatus::Estimated;
            sink.emit(FlightEvent::RadarContact {
                aircraft_id: aircraft_id.to_string(),
                flight: inner.flight.clone(),
            });
            return Some(Trigger::Depart);
        }
        None => {
            inner.flight.start_time = Some(current.timestamp);
            inner.flight.drop_before(current.timestamp);
            inner.flight.departure_info_found = InfoStatus::Estimated;
        }
    }

    sink.emit(FlightEvent::Takeoff {
        aircraft_id: aircraft_id.to_string(),
        flight: inner.flight.clone(),
    });
    Some(Trigger::Depart)
}
