//! Core data types for the strategy pipeline.

mod bar;
mod event;
mod signal;
mod table;
mod trade;
mod weights;

pub use bar::{PriceBar, PriceHistory};
pub use event::{Degradation, DegradationKind};
pub use signal::{SignalKind, SignalRow, SignalTable};
pub use table::{PriceTable, PriceView};
pub use trade::{CostEstimate, TradeDirection, TradeIntent, TradeOutcome, TradeRecord};
pub use weights::{WeightVector, WEIGHT_TOLERANCE};
