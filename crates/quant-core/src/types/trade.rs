//! Trade intents, cost estimates and logged outcomes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a weight change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Increase,
    Decrease,
}

/// A proposed weight change for one asset, produced by diffing consecutive
/// weight vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub asset_id: String,
    pub date: NaiveDate,
    pub direction: TradeDirection,
    /// Signed target weight change (positive for increases)
    pub weight_delta: f64,
}

impl TradeIntent {
    /// Absolute traded weight, the basis for cost estimation.
    pub fn turnover(&self) -> f64 {
        self.weight_delta.abs()
    }
}

/// Expected economics of executing one intent.
///
/// Ephemeral: recomputed at every rebalance decision, never persisted
/// except inside the trade log entry that consumed it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Expected edge from acting on the signal, as a portfolio-value fraction
    pub expected_alpha: f64,
    /// Commission on the traded notional
    pub commission: f64,
    /// Estimated slippage on the traded notional
    pub slippage: f64,
    /// `expected_alpha - (commission + slippage)`
    pub net_benefit: f64,
}

impl CostEstimate {
    /// Total friction (commission + slippage).
    pub fn total_friction(&self) -> f64 {
        self.commission + self.slippage
    }
}

/// Terminal state of an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TradeOutcome {
    Executed,
    /// Not an error: a recorded decision, observable for auditability.
    Suppressed { reason: String },
}

impl TradeOutcome {
    /// Whether the intent was executed.
    pub fn is_executed(&self) -> bool {
        matches!(self, TradeOutcome::Executed)
    }
}

/// A trade-log entry: the intent, its cost estimate and its outcome.
///
/// The cost is absent for intents suppressed before the cost gate ran
/// (the meta-filter rejects without pricing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub intent: TradeIntent,
    pub cost: Option<CostEstimate>,
    pub outcome: TradeOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turnover_is_absolute() {
        let intent = TradeIntent {
            asset_id: "AAPL".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            direction: TradeDirection::Decrease,
            weight_delta: -0.25,
        };
        assert!((intent.turnover() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_outcome_serializes_with_reason() {
        let outcome = TradeOutcome::Suppressed {
            reason: "net benefit below threshold".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("suppressed"));
        assert!(json.contains("net benefit"));
        assert!(!outcome.is_executed());
    }
}
