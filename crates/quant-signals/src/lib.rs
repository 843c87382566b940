//! Signal generation for the strategy pipeline.
//!
//! A [`SignalGenerator`] is a pure function of a point-in-time price view:
//! given bars dated `<= t`, it produces the signal table for date `t`.
//! Nothing here reads beyond the view's clock, so lookahead safety follows
//! from the view contract in `quant-core`.

pub mod composite;
pub mod generator;
pub mod indicators;
pub mod ranking;

pub use composite::CompositeWeights;
pub use generator::{MinHistoryPolicy, SignalConfig, SignalGenerator};
pub use indicators::{Indicator, Macd, RollingStd, Rsi};
pub use ranking::average_rank;
