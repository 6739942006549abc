//! Per-aircraft flight state machine and multiplexing factory for glider
//! telemetry.
//!
//! Ingests a stream of [`PositionUpdate`]s and emits high-level flight
//! events — takeoff, landing, launch-method classification, and
//! loss-of-contact — independently for each aircraft. The wire parser,
//! persistence, airfield lookup, and UI are all external collaborators;
//! this crate owns only the state machine (`context`) and the demultiplexer
//! that routes reports to it (`factory`).

pub mod aerotow;
pub mod context;
pub mod error;
pub mod events;
pub mod factory;
pub mod flight;
pub mod geo;
pub mod log_format;
pub mod metrics;
pub mod options;
pub mod position;
pub mod spline;

pub use context::FlightContext;
pub use error::{AerostateError, Result};
pub use events::{ErrorReason, FlightEvent};
pub use factory::{FlightContextFactory, StreamKind};
pub use flight::{Encounter, EncounterType, Flight, InfoStatus, LaunchMethod};
pub use options::{Options, TomlOptions};
pub use position::PositionUpdate;
