//! Backtest statistics and the final result snapshot.

use chrono::NaiveDate;
use quant_core::{Degradation, TradeRecord, WeightVector};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One equity observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacktestStatus {
    /// Ran through the full history
    Complete,
    /// Cancelled at a rebalance boundary; the curve stops early
    Partial,
}

/// Performance metrics computed once from the completed equity curve.
///
/// All annualized figures use the configured trading-days-per-year
/// constant — the same one threaded through every stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Compound annual growth rate
    pub cagr: f64,
    /// Annualized volatility of daily returns
    pub volatility: f64,
    /// Annualized Sharpe ratio (zero risk-free)
    pub sharpe: f64,
    /// Annualized Sortino ratio
    pub sortino: f64,
    /// Maximum peak-to-trough drawdown, as a positive fraction
    pub max_drawdown: f64,
    /// Fraction of sessions with a positive return
    pub win_rate: f64,
}

/// Equity tracker that accumulates during the run and is folded into a
/// [`BacktestResult`] at finalization.
#[derive(Debug, Clone)]
pub struct BacktestStats {
    initial_capital: Decimal,
    equity_curve: Vec<EquityPoint>,
    daily_returns: Vec<f64>,
}

impl BacktestStats {
    /// Start tracking from the initial capital.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            equity_curve: Vec::new(),
            daily_returns: Vec::new(),
        }
    }

    /// Record the portfolio value for a session.
    pub fn record_equity(&mut self, date: NaiveDate, value: f64) {
        let decimal_value = Decimal::try_from(value).unwrap_or_default();
        if let Some(last) = self.equity_curve.last() {
            let prev = last.value.to_f64().unwrap_or(0.0);
            if prev > 0.0 {
                self.daily_returns.push(value / prev - 1.0);
            }
        }
        self.equity_curve.push(EquityPoint {
            date,
            value: decimal_value,
        });
    }

    /// Sessions recorded so far.
    pub fn len(&self) -> usize {
        self.equity_curve.len()
    }

    /// Check whether anything has been recorded.
    pub fn is_empty(&self) -> bool {
        self.equity_curve.is_empty()
    }

    /// Daily returns recorded so far.
    pub fn daily_returns(&self) -> &[f64] {
        &self.daily_returns
    }

    /// Compute the final metrics from the recorded curve.
    pub fn metrics(&self, trading_days_per_year: usize) -> PerformanceMetrics {
        let tdpy = trading_days_per_year as f64;
        let n = self.daily_returns.len();

        let initial = self.initial_capital.to_f64().unwrap_or(0.0);
        let final_value = self
            .equity_curve
            .last()
            .map(|p| p.value.to_f64().unwrap_or(0.0))
            .unwrap_or(initial);

        let cagr = if initial > 0.0 && n > 0 {
            (final_value / initial).powf(tdpy / n as f64) - 1.0
        } else {
            0.0
        };

        let (volatility, sharpe, sortino, win_rate) = if n > 0 {
            let mean = self.daily_returns.iter().sum::<f64>() / n as f64;
            let variance = self
                .daily_returns
                .iter()
                .map(|r| (r - mean).powi(2))
                .sum::<f64>()
                / n as f64;
            let std_dev = variance.sqrt();

            let downside: Vec<f64> = self
                .daily_returns
                .iter()
                .filter(|r| **r < 0.0)
                .copied()
                .collect();
            let downside_dev = if downside.is_empty() {
                0.0
            } else {
                (downside.iter().map(|r| r.powi(2)).sum::<f64>() / downside.len() as f64).sqrt()
            };

            let sharpe = if std_dev > 0.0 {
                mean / std_dev * tdpy.sqrt()
            } else {
                0.0
            };
            let sortino = if downside_dev > 0.0 {
                mean / downside_dev * tdpy.sqrt()
            } else {
                0.0
            };
            let wins = self.daily_returns.iter().filter(|r| **r > 0.0).count();
            (
                std_dev * tdpy.sqrt(),
                sharpe,
                sortino,
                wins as f64 / n as f64,
            )
        } else {
            (0.0, 0.0, 0.0, 0.0)
        };

        PerformanceMetrics {
            cagr,
            volatility,
            sharpe,
            sortino,
            max_drawdown: self.max_drawdown(),
            win_rate,
        }
    }

    fn max_drawdown(&self) -> f64 {
        let mut peak = 0.0f64;
        let mut max_dd = 0.0f64;
        for point in &self.equity_curve {
            let value = point.value.to_f64().unwrap_or(0.0);
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }
        max_dd
    }

    /// Fold into the immutable result snapshot.
    pub fn finalize(
        self,
        status: BacktestStatus,
        method: String,
        trading_days_per_year: usize,
        final_weights: WeightVector,
        trade_log: Vec<TradeRecord>,
        degradations: Vec<Degradation>,
    ) -> BacktestResult {
        let metrics = self.metrics(trading_days_per_year);
        let final_value = self
            .equity_curve
            .last()
            .map(|p| p.value)
            .unwrap_or(self.initial_capital);
        // Content-derived id: identical runs must produce identical
        // results, so the id cannot be random.
        let first_date = self.equity_curve.first().map(|p| p.date);
        let seed = format!(
            "{method}:{:?}:{:?}:{}:{}",
            first_date,
            self.equity_curve.last().map(|p| p.date),
            final_value,
            trade_log.len()
        );
        BacktestResult {
            run_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()),
            status,
            method,
            initial_capital: self.initial_capital,
            final_value,
            equity_curve: self.equity_curve,
            metrics,
            final_weights,
            trade_log,
            degradations,
        }
    }
}

/// The immutable outcome of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Unique run identifier
    pub run_id: Uuid,
    /// Complete or partial (cancelled)
    pub status: BacktestStatus,
    /// Allocation method the run was configured with
    pub method: String,
    /// Starting capital
    pub initial_capital: Decimal,
    /// Final portfolio value
    pub final_value: Decimal,
    /// Equity per session
    pub equity_curve: Vec<EquityPoint>,
    /// Metrics from the completed curve
    pub metrics: PerformanceMetrics,
    /// The last weight vector, for handoff to a live allocator
    pub final_weights: WeightVector,
    /// Every intent with its outcome, executed and suppressed alike
    pub trade_log: Vec<TradeRecord>,
    /// Degradation events recorded during the run
    pub degradations: Vec<Degradation>,
}
