//! The cost-aware gate.

use std::collections::BTreeMap;

use quant_core::{TradeDirection, TradeIntent, TradeOutcome, TradeRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cost::CostModel;

/// Gate granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// All-or-nothing on the aggregate net benefit of the rebalance
    #[default]
    Portfolio,
    /// Each intent approved or suppressed independently
    PerAsset,
}

/// Gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Portfolio-level or per-asset gating
    pub mode: GateMode,
    /// Minimum net benefit (portfolio-value fraction) to execute
    pub min_net_benefit: f64,
    /// Expected edge per unit of signal-aligned turnover, the
    /// `expected_alpha` scale of the cost estimate
    pub expected_alpha_rate: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Portfolio,
            min_net_benefit: 0.0,
            expected_alpha_rate: 0.02,
        }
    }
}

/// Outcome of gating one rebalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// Every intent with its cost estimate and terminal outcome —
    /// suppressed intents stay observable here.
    pub records: Vec<TradeRecord>,
    /// Aggregate net benefit across all intents
    pub aggregate_net_benefit: f64,
}

impl GateReport {
    /// Intents that were approved for execution.
    pub fn executed(&self) -> impl Iterator<Item = &TradeIntent> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_executed())
            .map(|r| &r.intent)
    }

    /// Number of executed intents.
    pub fn executed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome.is_executed())
            .count()
    }

    /// Whether any trade was approved.
    pub fn any_executed(&self) -> bool {
        self.records.iter().any(|r| r.outcome.is_executed())
    }
}

/// The cost-aware gate: compares expected edge against realistic frictions
/// before any trade is allowed through.
pub struct CostGate {
    config: GateConfig,
    cost_model: CostModel,
}

impl CostGate {
    /// Create a gate.
    pub fn new(config: GateConfig, cost_model: CostModel) -> Self {
        Self { config, cost_model }
    }

    /// The cost model the gate prices with. The backtester applies this
    /// same model when debiting executed trades.
    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Evaluate a set of intents.
    ///
    /// `scores` are the composite signals the intents were derived from,
    /// `liquidity` maps asset id to average daily dollar volume. Intents
    /// are evaluated in input order (already sorted by asset id upstream).
    pub fn evaluate(
        &self,
        intents: &[TradeIntent],
        scores: &BTreeMap<String, f64>,
        portfolio_value: f64,
        liquidity: &BTreeMap<String, f64>,
    ) -> GateReport {
        let estimates: Vec<_> = intents
            .iter()
            .map(|intent| {
                let adv = liquidity.get(&intent.asset_id).copied().unwrap_or(0.0);
                let alpha = self.expected_alpha(intent, scores);
                self.cost_model
                    .estimate(intent, alpha, portfolio_value, adv)
            })
            .collect();

        let aggregate: f64 = estimates.iter().map(|e| e.net_benefit).sum();

        let records = match self.config.mode {
            GateMode::Portfolio => {
                let approved = aggregate > self.config.min_net_benefit;
                if !approved {
                    debug!(
                        aggregate,
                        threshold = self.config.min_net_benefit,
                        "rebalance suppressed at portfolio level"
                    );
                }
                intents
                    .iter()
                    .zip(estimates)
                    .map(|(intent, cost)| TradeRecord {
                        intent: intent.clone(),
                        cost: Some(cost),
                        outcome: if approved {
                            TradeOutcome::Executed
                        } else {
                            TradeOutcome::Suppressed {
                                reason: format!(
                                    "aggregate net benefit {:.6} below threshold {:.6}",
                                    aggregate, self.config.min_net_benefit
                                ),
                            }
                        },
                    })
                    .collect()
            }
            GateMode::PerAsset => intents
                .iter()
                .zip(estimates)
                .map(|(intent, cost)| TradeRecord {
                    intent: intent.clone(),
                    cost: Some(cost),
                    outcome: if cost.net_benefit > self.config.min_net_benefit {
                        TradeOutcome::Executed
                    } else {
                        TradeOutcome::Suppressed {
                            reason: format!(
                                "net benefit {:.6} below threshold {:.6}",
                                cost.net_benefit, self.config.min_net_benefit
                            ),
                        }
                    },
                })
                .collect(),
        };

        GateReport {
            records,
            aggregate_net_benefit: aggregate,
        }
    }

    /// Expected alpha of one intent: the configured edge rate on turnover
    /// aligned with the signal. Buying a high-score asset or trimming a
    /// low-score one earns positive expected edge; trading against the
    /// signal is expected to cost.
    fn expected_alpha(&self, intent: &TradeIntent, scores: &BTreeMap<String, f64>) -> f64 {
        let score = scores.get(&intent.asset_id).copied().unwrap_or(0.0);
        let alignment = match intent.direction {
            TradeDirection::Increase => score,
            TradeDirection::Decrease => -score,
        };
        self.config.expected_alpha_rate * intent.turnover() * alignment
    }
}
