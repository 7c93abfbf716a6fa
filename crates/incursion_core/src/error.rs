//! Error types for the invasion simulation.
//!
//! Pure calculations never fail; they degrade to neutral values. These
//! errors only surface from catalog loading and the state-update channel.

use thiserror::Error;

use crate::prisoners::PrisonerId;

/// Result type alias using [`InvasionError`].
pub type Result<T> = std::result::Result<T, InvasionError>;

/// Top-level error type for all invasion simulation errors.
#[derive(Debug, Error)]
pub enum InvasionError {
    /// The catalog has no composition weight configuration entry.
    #[error("Composition weights missing from catalog")]
    MissingCompositionWeights,

    /// The catalog has no invader definitions.
    #[error("Catalog contains no invader definitions")]
    EmptyCatalog,

    /// Data file parsing error.
    #[error("Failed to parse catalog data: {0}")]
    CatalogParse(String),

    /// An invasion was started while another is still running.
    #[error("Invasion {0} is already active")]
    InvasionAlreadyActive(String),

    /// An operation required a running invasion.
    #[error("No invasion is active")]
    NoActiveInvasion,

    /// Prisoner lookup failed.
    #[error("Prisoner not found: {0}")]
    PrisonerNotFound(PrisonerId),

    /// A state update was rejected and nothing was committed.
    #[error("State update rejected: {0}")]
    UpdateRejected(String),

    /// Snapshot (de)serialization failed.
    #[error("Failed to encode facility snapshot: {0}")]
    Snapshot(String),
}
