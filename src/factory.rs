//! `FlightContextFactory` (spec §4.3): a concurrent mapping from aircraft
//! identifier to `FlightContext`.
//!
//! Grounded on `FlightTracker`'s `AircraftStatesMap`
//! (`Arc<DashMap<Uuid, AircraftState>>`) plus its `start_timeout_checker`/
//! `start_state_cleanup` pattern of a `tokio::spawn`ed loop ticking on a
//! `tokio::time::interval` that snapshots and sweeps the map.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::aerotow::{AerotowProbe, FlightSnapshot, NeighborLookup, NoopAerotowProbe};
use crate::context::{EventSink, FlightContext};
use crate::error::{AerostateError, Result};
use crate::events::FlightEvent;
use crate::options::Options;
use crate::position::PositionUpdate;

const BROADCAST_CAPACITY: usize = 1024;

/// A single, fanned-out subscription stream kind (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Takeoff,
    Landing,
    RadarContact,
    CompletedWithErrors,
    ContextDisposed,
}

struct Channels {
    takeoff: broadcast::Sender<FlightEvent>,
    landing: broadcast::Sender<FlightEvent>,
    radar_contact: broadcast::Sender<FlightEvent>,
    completed_with_errors: broadcast::Sender<FlightEvent>,
    context_disposed: broadcast::Sender<FlightEvent>,
}

impl Channels {
    fn new() -> Self {
        Self {
            takeoff: broadcast::channel(BROADCAST_CAPACITY).0,
            landing: broadcast::channel(BROADCAST_CAPACITY).0,
            radar_contact: broadcast::channel(BROADCAST_CAPACITY).0,
            completed_with_errors: broadcast::channel(BROADCAST_CAPACITY).0,
            context_disposed: broadcast::channel(BROADCAST_CAPACITY).0,
        }
    }
}

/// Fans a `FlightContext`'s events out over the factory's broadcast
/// channels. Holds only the senders, not the factory itself (spec §9
/// design note: contexts never reference the factory).
struct FactorySink {
    channels: Arc<Channels>,
}

impl EventSink for FactorySink {
    fn emit(&self, event: FlightEvent) {
        metrics::counter!("aerostate.context.events_total", "kind" => event_kind(&event)).increment(1);
        let sender = match &event {
            FlightEvent::Takeoff { .. } => &self.channels.takeoff,
            FlightEvent::Landing { .. } => &self.channels.landing,
            FlightEvent::RadarContact { .. } => &self.channels.radar_contact,
            FlightEvent::CompletedWithErrors { .. } => &self.channels.completed_with_errors,
            FlightEvent::ContextDisposed { .. } => &self.channels.context_disposed,
        };
        // A lagging/absent subscriber never poisons delivery to others —
        // `broadcast::Sender::send` only errors when there are zero
        // receivers, which we deliberately ignore (spec §4.3: "best-effort").
        let _ = sender.send(event);
    }
}

fn event_kind(event: &FlightEvent) -> &'static str {
    match event {
        FlightEvent::Takeoff { .. } => "takeoff",
        FlightEvent::Landing { .. } => "landing",
        FlightEvent::RadarContact { .. } => "radar_contact",
        FlightEvent::CompletedWithErrors { .. } => "completed_with_errors",
        FlightEvent::ContextDisposed { .. } => "context_disposed",
    }
}

/// The shared, concurrent aircraft-id -> context map, grounded directly on
/// `AircraftStatesMap`.
type ContextMap = Arc<dashmap::DashMap<String, Arc<FlightContext>>>;

/// Demultiplexes a shared position-report stream into per-aircraft
/// `FlightContext`s, expiring idle ones and fanning out their events.
pub struct FlightContextFactory {
    contexts: ContextMap,
    channels: Arc<Channels>,
    /// Read-only after construction (spec §5) — no lock needed.
    options: Options,
    probe: Arc<dyn AerotowProbe>,
}

impl FlightContextFactory {
    pub fn new(options: Options, probe: Arc<dyn AerotowProbe>) -> Arc<Self> {
        Arc::new(Self {
            contexts: Arc::new(dashmap::DashMap::new()),
            channels: Arc::new(Channels::new()),
            options,
            probe,
        })
    }

    /// Convenience constructor for a factory with no aerotow detection
    /// (`Options.nearby_runtime == false`).
    pub fn without_aerotow_detection(options: Options) -> Arc<Self> {
        Self::new(options, Arc::new(NoopAerotowProbe))
    }

    fn sink(&self) -> Arc<dyn EventSink> {
        Arc::new(FactorySink {
            channels: Arc::clone(&self.channels),
        })
    }

    fn new_context(&self, aircraft_id: &str) -> Arc<FlightContext> {
        FlightContext::new(aircraft_id.to_string(), self.sink())
    }

    fn or_create(&self, aircraft_id: &str) -> Arc<FlightContext> {
        self.contexts
            .entry(aircraft_id.to_string())
            .or_insert_with(|| self.new_context(aircraft_id))
            .clone()
    }

    /// Ignore entries with an empty/whitespace aircraftId, group the rest by
    /// aircraftId, and forward each group to its context in order (spec §4.3).
    #[instrument(skip_all)]
    pub async fn enqueue(&self, reports: Vec<PositionUpdate>) {
        let mut by_aircraft: std::collections::HashMap<String, Vec<PositionUpdate>> =
            std::collections::HashMap::new();
        for report in reports {
            if report.aircraft_id.trim().is_empty() {
                continue;
            }
            by_aircraft
                .entry(report.aircraft_id.clone())
                .or_default()
                .push(report);
        }

        for (aircraft_id, mut group) in by_aircraft {
            group.sort_by_key(|p| p.timestamp);
            let context = self.or_create(&aircraft_id);
            let neighbors = self.neighbor_lookup(&aircraft_id);
            context.enqueue(group, &*self.probe, &neighbors).await;
        }
    }

    /// `attach(metadata)` (spec §4.3): construct a fresh context for
    /// `aircraft_id` and attach it, replacing any existing context for the
    /// same id.
    pub async fn attach(&self, aircraft_id: impl Into<String>) -> Result<Arc<FlightContext>> {
        let aircraft_id = aircraft_id.into();
        if aircraft_id.trim().is_empty() {
            return Err(AerostateError::EmptyAircraftId);
        }
        let context = self.new_context(&aircraft_id);
        if self.options.minify_memory_pressure {
            context.set_minify_memory_pressure(true).await;
        }
        self.contexts.insert(aircraft_id, Arc::clone(&context));
        Ok(context)
    }

    /// `attach(context)` (spec §4.3): attach an already-constructed context
    /// (typically one previously obtained via `detach`), replacing any
    /// existing context for the same aircraftId. Unlike `attach(metadata)`,
    /// this preserves the context's existing `Flight`/state — the detach ->
    /// attach round-trip spec §8 requires yields an identical aggregate.
    pub async fn attach_context(&self, context: Arc<FlightContext>) -> Result<Arc<FlightContext>> {
        let aircraft_id = context.aircraft_id().to_string();
        if aircraft_id.trim().is_empty() {
            return Err(AerostateError::EmptyAircraftId);
        }
        if self.options.minify_memory_pressure {
            context.set_minify_memory_pressure(true).await;
        }
        self.contexts.insert(aircraft_id, Arc::clone(&context));
        Ok(context)
    }

    pub fn get_context(&self, aircraft_id: &str) -> Option<Arc<FlightContext>> {
        self.contexts.get(aircraft_id).map(|e| e.clone())
    }

    /// Direct removal; does not fire `ContextDisposed` (explicit transfer of
    /// ownership to the caller, spec §4.3).
    pub fn detach(&self, aircraft_id: &str) -> Option<Arc<FlightContext>> {
        self.contexts.remove(aircraft_id).map(|(_, ctx)| ctx)
    }

    pub fn subscribe(&self, kind: StreamKind) -> broadcast::Receiver<FlightEvent> {
        match kind {
            StreamKind::Takeoff => self.channels.takeoff.subscribe(),
            StreamKind::Landing => self.channels.landing.subscribe(),
            StreamKind::RadarContact => self.channels.radar_contact.subscribe(),
            StreamKind::CompletedWithErrors => self.channels.completed_with_errors.subscribe(),
            StreamKind::ContextDisposed => self.channels.context_disposed.subscribe(),
        }
    }

    fn neighbor_lookup(&self, aircraft_id: &str) -> FactoryNeighbors {
        FactoryNeighbors {
            contexts: Arc::clone(&self.contexts),
            self_id: aircraft_id.to_string(),
        }
    }

    /// Run one expiry sweep: snapshot candidate victims, then remove them
    /// individually, never holding the map lock while emitting events
    /// (spec §5).
    #[instrument(skip_all)]
    pub async fn sweep_expired(&self) {
        let expiration = self.options.context_expiration;
        let now = Instant::now();

        // Snapshot first so no DashMap shard guard is held across the
        // `.await` below (spec §5: never hold the map lock while checking
        // or emitting).
        let snapshot: Vec<(String, Arc<FlightContext>)> = self
            .contexts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut victims = Vec::new();
        for (aircraft_id, context) in snapshot {
            if now.duration_since(context.last_active().await) > expiration {
                victims.push(aircraft_id);
            }
        }

        let mut expired_count = 0u64;
        for aircraft_id in victims {
            if let Some((_, context)) = self.contexts.remove(&aircraft_id) {
                let flight = context.snapshot().await;
                debug!(%aircraft_id, "expiring idle context");
                self.sink().emit(FlightEvent::ContextDisposed {
                    aircraft_id,
                    flight,
                });
                expired_count += 1;
            }
        }

        if expired_count > 0 {
            metrics::counter!("aerostate.factory.contexts_expired_total").increment(expired_count);
        }
    }

    /// Spawn the periodic expiry tick (default every 10 s, spec §4.3).
    pub fn start_expiry_tick(self: &Arc<Self>, period: std::time::Duration) {
        let factory = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                factory.sweep_expired().await;
            }
        });
        info!(?period, "started context expiry tick");
    }
}

struct FactoryNeighbors {
    contexts: ContextMap,
    self_id: String,
}

impl NeighborLookup for FactoryNeighbors {
    fn neighbors(&self, self_id: &str) -> Vec<FlightSnapshot> {
        // Synchronous snapshot only of what's cheaply available; a full
        // position history snapshot would need an async lookup per context,
        // left to a richer `AerotowProbe` implementation that wants it.
        self.contexts
            .iter()
            .filter(|entry| entry.key().as_str() != self_id)
            .map(|entry| FlightSnapshot {
                aircraft_id: entry.key().clone(),
                departure_time: None,
                current_position: None,
                recent_positions: Vec::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn enqueue_drops_empty_aircraft_ids() {
        let factory = FlightContextFactory::without_aerotow_detection(Options::default());
        let reports = vec![PositionUpdate::new(
            "  ",
            chrono::Utc::now(),
            52.0,
            5.0,
            0.0,
            0.0,
            0.0,
        )];
        factory.enqueue(reports).await;
        assert!(factory.get_context("  ").is_none());
    }

    #[tokio::test]
    async fn attach_rejects_empty_aircraft_id() {
        let factory = FlightContextFactory::without_aerotow_detection(Options::default());
        let result = factory.attach("   ").await;
        assert_eq!(result.err(), Some(AerostateError::EmptyAircraftId));
    }

    #[tokio::test]
    async fn detach_then_attach_context_round_trips_the_flight() {
        let factory = FlightContextFactory::without_aerotow_detection(Options::default());
        factory
            .enqueue(vec![PositionUpdate::new(
                "G1",
                chrono::Utc::now(),
                52.0,
                5.0,
                1500.0,
                90.0,
                270.0,
            )])
            .await;
        let before = factory.get_context("G1").unwrap().snapshot().await;

        let detached = factory.detach("G1").unwrap();
        assert!(factory.get_context("G1").is_none());

        factory.attach_context(detached).await.unwrap();
        let after = factory.get_context("G1").unwrap().snapshot().await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn detach_does_not_emit_context_disposed() {
        let factory = FlightContextFactory::without_aerotow_detection(Options::default());
        let mut disposed = factory.subscribe(StreamKind::ContextDisposed);
        factory.attach("G1").await.unwrap();
        factory.detach("G1");
        assert!(factory.get_context("G1").is_none());
        assert!(disposed.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_expired_emits_context_disposed() {
        let mut options = Options::default();
        options.context_expiration = Duration::from_millis(1);
        let factory = FlightContextFactory::without_aerotow_detection(options);
        let mut disposed = factory.subscribe(StreamKind::ContextDisposed);
        factory.attach("G1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        factory.sweep_expired().await;
        assert!(factory.get_context("G1").is_none());
        assert!(disposed.try_recv().is_ok());
    }
}
