//! Crate error type.
//!
//! Most of this crate reports "not enough data yet" via `Option`/early
//! return rather than `Result` — that is expected control flow, not an
//! error (see spec §7). `AerostateError` exists for the few genuinely
//! exceptional, matchable conditions.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AerostateError {
    /// `CubicSpline::fit` requires at least two samples with strictly
    /// increasing `x` values.
    #[error("cubic spline requires at least 2 samples, got {0}")]
    InsufficientSamples(usize),

    /// `CubicSpline::fit` requires strictly increasing `x` values.
    #[error("cubic spline x values must be strictly increasing")]
    NonMonotonicSamples,

    /// `FlightContextFactory::attach`/`enqueue` rejects an empty or
    /// whitespace-only aircraft identifier.
    #[error("aircraft id must not be empty")]
    EmptyAircraftId,
}

pub type Result<T> = std::result::Result<T, AerostateError>;
