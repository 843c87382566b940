//! Cost-aware trade gating and the optional meta-filter.
//!
//! Order is fixed: the meta-filter (when configured) prunes candidate
//! intents first, then the cost gate weighs the survivors' expected edge
//! against commission and slippage. Suppressed intents are recorded, not
//! dropped — the trade log is the audit trail.

pub mod cost;
pub mod features;
pub mod gate;
pub mod meta_filter;

pub use cost::{average_daily_dollar_volume, CostModel, SlippageModel};
pub use features::TradeFeatures;
pub use gate::{CostGate, GateConfig, GateMode, GateReport};
pub use meta_filter::{MetaFilter, ModelArtifact};
