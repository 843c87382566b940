//! Transaction cost model.
//!
//! The same model instance prices trades for the live gate and debits the
//! backtest ledger, so simulated performance claims the same frictions a
//! live run would incur.

use quant_core::{CostEstimate, PriceBar, TradeIntent};
use serde::{Deserialize, Serialize};

/// Slippage as a function of trade size and asset liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SlippageModel {
    /// Flat basis points on the traded notional
    Fixed { bps: f64 },
    /// Base cost plus linear market impact in the trade's share of average
    /// daily dollar volume
    Linear { base_bps: f64, impact_coeff: f64 },
}

impl SlippageModel {
    /// Slippage in basis points for a trade that is `participation` of the
    /// asset's average daily dollar volume.
    pub fn bps(&self, participation: f64) -> f64 {
        match self {
            SlippageModel::Fixed { bps } => *bps,
            SlippageModel::Linear {
                base_bps,
                impact_coeff,
            } => base_bps + impact_coeff * participation.max(0.0) * 1e4,
        }
    }
}

/// Cost model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Commission as a fraction of traded notional
    pub commission_rate: f64,
    /// Trailing sessions over which liquidity (ADV) is measured
    pub liquidity_window: usize,
    /// Slippage model
    pub slippage: SlippageModel,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            commission_rate: 0.001,
            liquidity_window: 21,
            slippage: SlippageModel::Linear {
                base_bps: 5.0,
                impact_coeff: 0.1,
            },
        }
    }
}

impl CostModel {
    /// Price one intent.
    ///
    /// All amounts are fractions of portfolio value: an intent moving
    /// `|Δw|` of the book trades `|Δw| * portfolio_value` of notional, and
    /// commission/slippage are charged on that notional.
    pub fn estimate(
        &self,
        intent: &TradeIntent,
        expected_alpha: f64,
        portfolio_value: f64,
        adv_dollars: f64,
    ) -> CostEstimate {
        let turnover = intent.turnover();
        let commission = self.commission_rate * turnover;

        let notional = turnover * portfolio_value.max(0.0);
        let participation = if adv_dollars > 0.0 {
            notional / adv_dollars
        } else {
            // Unknown liquidity prices as fully impactful.
            1.0
        };
        let slippage = self.slippage.bps(participation) / 1e4 * turnover;

        CostEstimate {
            expected_alpha,
            commission,
            slippage,
            net_benefit: expected_alpha - (commission + slippage),
        }
    }
}

/// Average daily dollar volume over the trailing `window` bars.
pub fn average_daily_dollar_volume(bars: &[PriceBar], window: usize) -> f64 {
    if bars.is_empty() || window == 0 {
        return 0.0;
    }
    let start = bars.len().saturating_sub(window);
    let tail = &bars[start..];
    tail.iter().map(|b| b.close * b.volume).sum::<f64>() / tail.len() as f64
}
