//! Domain events emitted by a `FlightContext` and fanned out by the factory.

use serde::{Deserialize, Serialize};

use crate::flight::Flight;

/// Why a flight reached `Arrived` without complete arrival data (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorReason {
    ArrivalLocationUnknown,
    ArrivalHeadingUnknown,
}

/// A domain event emitted by a `FlightContext`, carrying a snapshot of the
/// `Flight` at the moment it fired (spec §6, observer contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlightEvent {
    Takeoff { aircraft_id: String, flight: Flight },
    Landing { aircraft_id: String, flight: Flight },
    RadarContact { aircraft_id: String, flight: Flight },
    CompletedWithErrors {
        aircraft_id: String,
        flight: Flight,
        reasons: Vec<ErrorReason>,
    },
    ContextDisposed { aircraft_id: String, flight: Flight },
}

impl FlightEvent {
    pub fn aircraft_id(&self) -> &str {
        match self {
            FlightEvent::Takeoff { aircraft_id, .. }
            | FlightEvent::Landing { aircraft_id, .. }
            | FlightEvent::RadarContact { aircraft_id, .. }
            | FlightEvent::CompletedWithErrors { aircraft_id, .. }
            | FlightEvent::ContextDisposed { aircraft_id, .. } => aircraft_id,
        }
    }

    pub fn flight(&self) -> &Flight {
        match self {
            FlightEvent::Takeoff { flight, .. }
            | FlightEvent::Landing { flight, .. }
            | FlightEvent::RadarContact { flight, .. }
            | FlightEvent::CompletedWithErrors { flight, .. }
            | FlightEvent::ContextDisposed { flight, .. } => flight,
        }
    }
}
