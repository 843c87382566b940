//! Core types and errors for the strategy pipeline.
//!
//! This crate provides the foundational building blocks shared by every
//! pipeline stage:
//! - Price data types (PriceBar, PriceHistory, PriceTable, PriceView)
//! - Signal tables produced by the signal generator
//! - Weight vectors and trade intents exchanged between optimizer and gate
//! - Degradation events recorded when a stage recovers from a failure
//! - The error taxonomy for the whole pipeline
//!
//! Every stage owns and returns new immutable data; nothing in this crate
//! holds shared mutable state.

pub mod error;
pub mod types;

pub use error::{
    AllocateError, DataError, LookaheadViolation, PipelineError, PipelineResult, SignalError,
};
pub use types::*;
