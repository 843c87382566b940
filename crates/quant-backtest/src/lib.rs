//! Backtesting for the strategy pipeline.
//!
//! Replays the signal → optimize → gate pipeline over historical data
//! under strict point-in-time discipline, applies the same cost model the
//! live gate uses, and reduces the completed equity curve to performance
//! metrics and statistical validation.

pub mod engine;
pub mod report;
pub mod statistics;
pub mod validation;

pub use engine::{run_many, BacktestConfig, BacktestEngine, CancelToken};
pub use statistics::{
    BacktestResult, BacktestStats, BacktestStatus, EquityPoint, PerformanceMetrics,
};
pub use validation::{validate_backtest, BacktestValidation};
