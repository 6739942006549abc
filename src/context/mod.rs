//! The per-aircraft flight state machine (spec §4.2).
//!
//! Consolidated into a single authoritative model — the teacher itself
//! carries two parallel implementations (`flight_tracker.rs` and
//! `flight_tracker/`), which spec.md §9 calls out as the mistake to avoid
//! repeating here.

mod aerotow;
mod arriving;
mod cruise;
mod departing;
mod stationary;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, instrument, warn};

use crate::aerotow::{AerotowProbe, FlightSnapshot, NeighborLookup};
use crate::events::{ErrorReason, FlightEvent};
use crate::flight::Flight;
use crate::position::PositionUpdate;

fn build_flight_snapshot(flight: &Flight, current: &PositionUpdate, aircraft_id: &str) -> FlightSnapshot {
    FlightSnapshot {
        aircraft_id: aircraft_id.to_string(),
        departure_time: flight.start_time,
        current_position: Some(current.clone()),
        recent_positions: flight.position_updates.clone(),
    }
}

/// Knots above which an aircraft is considered moving (spec §4.2.1/§4.2 re-arm note).
pub const MOVING_SPEED_THRESHOLD_KNOTS: f64 = 30.0;

/// Default floor used by the Cruise handler's descent heuristic (spec §4.2.4, left open by spec.md §9).
pub const DEFAULT_LOW_ALTITUDE_THRESHOLD_METERS: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Initial,
    Stationary,
    Departing,
    Aerotow,
    Cruise,
    Arriving,
    Arrived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Depart,
    TrackAerotow,
    LaunchCompleted,
    Landing,
    LandingAborted,
    Arrived,
}

fn apply_transition(state: FlightState, trigger: Trigger) -> Option<FlightState> {
    use FlightState::*;
    use Trigger::*;
    match (state, trigger) {
        (Initial, Depart) | (Stationary, Depart) => Some(Departing),
        (Departing, TrackAerotow) => Some(Aerotow),
        (Departing, LaunchCompleted) => Some(Cruise),
        (Departing, Landing) => Some(Arriving),
        (Aerotow, LaunchCompleted) => Some(Cruise),
        (Cruise, Landing) => Some(Arriving),
        (Arriving, LandingAborted) => Some(Cruise),
        (Arriving, Arrived) => Some(FlightState::Arrived),
        _ => None,
    }
}

/// Sink a `FlightContext` reports its events to. The factory implements this
/// and owns the broadcast channels; contexts hold only this narrow trait
/// object, never a reference back to the factory itself (spec §9 design
/// note: "contexts do not reference the factory").
pub trait EventSink: Send + Sync {
    fn emit(&self, event: FlightEvent);
}

/// An `EventSink` that drops everything, useful for tests and for contexts
/// constructed outside a factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: FlightEvent) {}
}

pub(crate) struct FlightContextInner {
    pub(crate) flight: Flight,
    pub(crate) state: FlightState,
    pub(crate) current_position: Option<PositionUpdate>,
    pub(crate) last_active: Instant,
    pub(crate) low_altitude_threshold_meters: f64,
    pub(crate) minify_memory_pressure: bool,
    /// First sample with `speed > 30 kt` observed since the current
    /// departure began — used for the Departing handler's 10 s debounce.
    pub(crate) first_moving_sample: Option<DateTime<Utc>>,
    arrival_timer: Option<AbortHandle>,
    /// Set by the Arriving handler's Case C when it wants a synthetic
    /// re-evaluation once its estimate ripens, consumed by `enqueue` after
    /// the intake loop to (re)spawn the timer task.
    pending_arrival_check: Option<DateTime<Utc>>,
}

impl FlightContextInner {
    fn new(aircraft_id: String) -> Self {
        Self {
            flight: Flight::new(aircraft_id),
            state: FlightState::Initial,
            current_position: None,
            last_active: Instant::now(),
            low_altitude_threshold_meters: DEFAULT_LOW_ALTITUDE_THRESHOLD_METERS,
            minify_memory_pressure: false,
            first_moving_sample: None,
            arrival_timer: None,
            pending_arrival_check: None,
        }
    }

    fn cancel_arrival_timer(&mut self) {
        if let Some(handle) = self.arrival_timer.take() {
            handle.abort();
        }
    }

    /// Reset to a fresh flight for the aircraft, keeping the context object
    /// itself (spec §4.2 "the context may be reused for a subsequent flight
    /// by resetting to Initial upon next motion").
    fn rearm(&mut self) {
        self.cancel_arrival_timer();
        let aircraft_id = self.flight.aircraft_id.clone();
        self.flight = Flight::new(aircraft_id);
        self.state = FlightState::Initial;
        self.current_position = None;
        self.first_moving_sample = None;
        self.pending_arrival_check = None;
    }

    fn reasons_for_incomplete_arrival(&self) -> Vec<ErrorReason> {
        let mut reasons = Vec::new();
        if self.flight.arrival_location.is_none() {
            reasons.push(ErrorReason::ArrivalLocationUnknown);
        }
        if self.flight.arrival_heading.is_none() {
            reasons.push(ErrorReason::ArrivalHeadingUnknown);
        }
        reasons
    }

    fn trim_if_under_memory_pressure(&mut self) {
        if self.minify_memory_pressure {
            if let Some(current) = &self.current_position {
                let cutoff = current.timestamp;
                self.flight.drop_before(cutoff);
            }
        }
    }
}

/// The per-aircraft state machine. Cheap to hold as `Arc<FlightContext>` —
/// all mutation goes through its internal mailbox lock.
pub struct FlightContext {
    aircraft_id: String,
    inner: Mutex<FlightContextInner>,
    sink: Arc<dyn EventSink>,
}

impl FlightContext {
    pub fn new(aircraft_id: impl Into<String>, sink: Arc<dyn EventSink>) -> Arc<Self> {
        let aircraft_id = aircraft_id.into();
        Arc::new(Self {
            inner: Mutex::new(FlightContextInner::new(aircraft_id.clone())),
            aircraft_id,
            sink,
        })
    }

    pub fn aircraft_id(&self) -> &str {
        &self.aircraft_id
    }

    pub(crate) async fn set_minify_memory_pressure(&self, enabled: bool) {
        let mut inner = self.inner.lock().await;
        inner.minify_memory_pressure = enabled;
        if enabled {
            inner.trim_if_under_memory_pressure();
        }
    }

    pub async fn last_active(&self) -> Instant {
        self.inner.lock().await.last_active
    }

    pub async fn snapshot(&self) -> Flight {
        self.inner.lock().await.flight.clone()
    }

    /// Process a batch of reports for this aircraft, in order, emitting
    /// events to the sink as state handlers fire triggers.
    #[instrument(skip_all, fields(aircraft_id = %self.aircraft_id))]
    pub async fn enqueue(
        self: &Arc<Self>,
        reports: Vec<PositionUpdate>,
        probe: &dyn AerotowProbe,
        neighbors: &dyn NeighborLookup,
    ) {
        let mut inner = self.inner.lock().await;
        for report in reports {
            self.process_one(&mut inner, report, probe, neighbors);
        }

        if let Some(fire_at) = inner.pending_arrival_check.take() {
            self.spawn_arrival_timer(&mut inner, fire_at);
        }
    }

    fn process_one(
        self: &Arc<Self>,
        inner: &mut FlightContextInner,
        report: PositionUpdate,
        probe: &dyn AerotowProbe,
        neighbors: &dyn NeighborLookup,
    ) {
        if inner.state == FlightState::Arrived && report.speed > MOVING_SPEED_THRESHOLD_KNOTS {
            debug!("re-arming context for a new flight");
            inner.rearm();
        }

        if report.speed > MOVING_SPEED_THRESHOLD_KNOTS && inner.first_moving_sample.is_none() {
            inner.first_moving_sample = Some(report.timestamp);
        }

        inner.last_active = Instant::now();
        if !inner.flight.insert_ordered(report.clone()) {
            debug!("duplicate report re-enqueued, skipping re-processing");
            return;
        }
        inner.current_position = Some(report);

        let first_trigger = self.dispatch(inner, probe, neighbors);
        if let Some(trigger) = first_trigger {
            self.apply(inner, trigger, probe, neighbors);
        }

        inner.trim_if_under_memory_pressure();
    }

    /// Apply a fired trigger's transition, then run the new state's handler
    /// once more (spec §4.2 point 4: "at most one trigger-driven transition
    /// per intake" — i.e. re-entering a handler happens at most once; a
    /// trigger fired by that re-entered handler still transitions the state,
    /// it just doesn't cause a third handler invocation this intake).
    fn apply(
        self: &Arc<Self>,
        inner: &mut FlightContextInner,
        trigger: Trigger,
        probe: &dyn AerotowProbe,
        neighbors: &dyn NeighborLookup,
    ) {
        let Some(new_state) = apply_transition(inner.state, trigger) else {
            warn!(?trigger, from = ?inner.state, "trigger had no transition from this state");
            return;
        };
        inner.state = new_state;
        self.note_if_arrived_incomplete(inner, new_state);

        if let Some(trigger2) = self.dispatch(inner, probe, neighbors) {
            if let Some(new_state2) = apply_transition(inner.state, trigger2) {
                inner.state = new_state2;
                self.note_if_arrived_incomplete(inner, new_state2);
            }
        }
    }

    fn note_if_arrived_incomplete(&self, inner: &FlightContextInner, state: FlightState) {
        if state != FlightState::Arrived {
            return;
        }
        let reasons = inner.reasons_for_incomplete_arrival();
        if !reasons.is_empty() {
            self.sink.emit(FlightEvent::CompletedWithErrors {
                aircraft_id: self.aircraft_id.clone(),
                flight: inner.flight.clone(),
                reasons,
            });
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        inner: &mut FlightContextInner,
        probe: &dyn AerotowProbe,
        neighbors: &dyn NeighborLookup,
    ) -> Option<Trigger> {
        match inner.state {
            FlightState::Initial | FlightState::Stationary => {
                stationary::handle(inner, &*self.sink, &self.aircraft_id)
            }
            FlightState::Departing => departing::handle(inner, &self.aircraft_id, probe, neighbors),
            FlightState::Aerotow => aerotow::handle(inner, &self.aircraft_id, probe, neighbors),
            FlightState::Cruise => cruise::handle(inner),
            FlightState::Arriving => {
                inner.cancel_arrival_timer();
                arriving::handle(inner, &*self.sink, &self.aircraft_id)
            }
            FlightState::Arrived => None,
        }
    }

    fn spawn_arrival_timer(self: &Arc<Self>, inner: &mut FlightContextInner, fire_at: DateTime<Utc>) {
        let delay = (fire_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        let this = Arc::clone(self);
        let join_handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.tick_arrival_theory().await;
        });
        inner.arrival_timer = Some(join_handle.abort_handle());
    }

    /// Re-evaluate an Arriving context whose estimated arrival theory has
    /// ripened, without a new `PositionUpdate` having arrived (spec §8
    /// scenario 5).
    async fn tick_arrival_theory(self: Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.state != FlightState::Arriving {
            return;
        }
        if let Some(trigger) = arriving::finalize_ripened_theory(&mut inner, &*self.sink, &self.aircraft_id) {
            self.apply(&mut inner, trigger, &crate::aerotow::NoopAerotowProbe, &NoNeighbors);
        }
    }
}

struct NoNeighbors;
impl NeighborLookup for NoNeighbors {
    fn neighbors(&self, _self_id: &str) -> Vec<crate::aerotow::FlightSnapshot> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_spec() {
        use FlightState::*;
        use Trigger::*;
        assert_eq!(apply_transition(Initial, Depart), Some(Departing));
        assert_eq!(apply_transition(Stationary, Depart), Some(Departing));
        assert_eq!(apply_transition(Departing, TrackAerotow), Some(Aerotow));
        assert_eq!(apply_transition(Departing, LaunchCompleted), Some(Cruise));
        assert_eq!(apply_transition(Departing, Landing), Some(Arriving));
        assert_eq!(apply_transition(Aerotow, LaunchCompleted), Some(Cruise));
        assert_eq!(apply_transition(Cruise, Landing), Some(Arriving));
        assert_eq!(apply_transition(Arriving, LandingAborted), Some(Cruise));
        assert_eq!(apply_transition(Arriving, Arrived), Some(FlightState::Arrived));
        assert_eq!(apply_transition(Cruise, Depart), None);
    }
}
