//! Error types for the strategy pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("Allocation error: {0}")]
    Allocate(#[from] AllocateError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Lookahead(#[from] LookaheadViolation),

    #[error("Model artifact error: {0}")]
    ModelArtifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A stage requested price data beyond the simulation clock.
///
/// This is fatal by contract: it indicates a correctness bug (lookahead
/// bias) in the caller and must never be caught and ignored.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("lookahead violation: requested {requested} but simulation clock is at {clock}")]
pub struct LookaheadViolation {
    /// Date the stage asked for
    pub requested: NaiveDate,
    /// Current simulation clock
    pub clock: NaiveDate,
}

/// Signal generation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("insufficient history for {asset_id}: need {required} bars, have {available}")]
    InsufficientHistory {
        asset_id: String,
        required: usize,
        available: usize,
    },

    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    #[error("invalid signal configuration: {0}")]
    InvalidConfig(String),
}

/// Portfolio allocation errors.
///
/// These are recoverable at the optimizer boundary: a failing method falls
/// back to the default allocator and the failure is recorded as a
/// degradation event instead of propagating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocateError {
    #[error("covariance matrix is singular or ill-conditioned ({dimension}x{dimension})")]
    SingularCovariance { dimension: usize },

    #[error("allocation did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("constraints are infeasible: {0}")]
    Infeasible(String),

    #[error("invalid allocation input: {0}")]
    InvalidInput(String),
}

/// Input data errors.
///
/// Malformed bars violate the supplier contract (§price-sanity invariants)
/// and propagate to the caller uncaught.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("malformed bar for {asset_id} on {date}: {reason}")]
    MalformedBar {
        asset_id: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("bars for {asset_id} are not strictly date-ascending at {date}")]
    OutOfOrder { asset_id: String, date: NaiveDate },

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("price table is empty")]
    EmptyTable,

    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
