//! The backtest engine.
//!
//! A state machine over the simulation clock: at each rebalance date the
//! pipeline runs LoadWindow → GenerateSignals → Optimize → MetaFilter →
//! Gate → ApplyTrades → Record, strictly in that order, over a price view
//! bounded by the clock. Every stage sees only data dated at or before the
//! current session — a request beyond it is a [`quant_core::LookaheadViolation`]
//! and aborts the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use quant_allocate::{run_allocation, AllocateConfig, CovarianceMatrix};
use quant_core::{
    Degradation, PipelineError, PipelineResult, PriceTable, PriceView, SignalTable, TradeIntent,
    TradeOutcome, TradeRecord, WeightVector,
};
use quant_gate::{average_daily_dollar_volume, CostGate, MetaFilter, TradeFeatures};
use quant_signals::SignalGenerator;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::statistics::{BacktestResult, BacktestStats, BacktestStatus};

/// Engine-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting capital
    pub initial_capital: Decimal,
    /// Sessions between rebalances
    pub rebalance_every: usize,
    /// Sessions per year for all annualization
    pub trading_days_per_year: usize,
    /// Bound on the optimizer ⇄ gate retry loop per rebalance
    pub max_rebalance_attempts: usize,
    /// Score-floor tightening applied on each retry after a gate rejection
    pub retry_score_step: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100000),
            rebalance_every: 21,
            trading_days_per_year: 252,
            max_rebalance_attempts: 3,
            retry_score_step: 0.1,
        }
    }
}

impl BacktestConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.rebalance_every == 0 {
            return Err(PipelineError::Config(
                "rebalance_every must be positive".to_string(),
            ));
        }
        if self.max_rebalance_attempts == 0 {
            return Err(PipelineError::Config(
                "max_rebalance_attempts must be positive".to_string(),
            ));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err(PipelineError::Config(
                "initial_capital must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cooperative cancellation, checked at rebalance boundaries.
///
/// A cancelled run finalizes normally with [`BacktestStatus::Partial`] —
/// never a silently truncated curve pretending to be complete.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a live token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Initialized,
    LoadWindow,
    GenerateSignals,
    Optimize,
    MetaFilter,
    Gate,
    ApplyTrades,
    Record,
    Finalized,
}

/// The backtest engine: owns the stage configurations and drives the
/// state machine over a supplied price table.
pub struct BacktestEngine {
    config: BacktestConfig,
    generator: SignalGenerator,
    allocate: AllocateConfig,
    gate: CostGate,
    meta_filter: Option<MetaFilter>,
}

/// What one rebalance attempt concluded.
struct RebalanceOutcome {
    weights: WeightVector,
    records: Vec<TradeRecord>,
    degradations: Vec<Degradation>,
    cost_paid: f64,
}

impl BacktestEngine {
    /// Assemble an engine from validated stage configurations.
    pub fn new(
        config: BacktestConfig,
        generator: SignalGenerator,
        allocate: AllocateConfig,
        gate: CostGate,
        meta_filter: Option<MetaFilter>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        allocate.validate()?;
        Ok(Self {
            config,
            generator,
            allocate,
            gate,
            meta_filter,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the full simulation over `table`.
    ///
    /// Single-threaded and deterministic: the same table and configuration
    /// always produce the same result. The pipeline performs no I/O — the
    /// table is already in memory.
    pub fn run(&self, table: &PriceTable, cancel: &CancelToken) -> PipelineResult<BacktestResult> {
        if table.is_empty() {
            return Err(quant_core::DataError::EmptyTable.into());
        }

        let sessions = table.session_dates();
        let warmup = self
            .generator
            .config()
            .required_bars()
            .max(self.allocate.cov_window + 1);

        let mut state = EngineState::Initialized;
        let mut stats = BacktestStats::new(self.config.initial_capital);
        let mut value = self.config.initial_capital.to_f64().unwrap_or(0.0);
        let mut weights = WeightVector::new(sessions[0]);
        let mut trade_log: Vec<TradeRecord> = Vec::new();
        let mut degradations: Vec<Degradation> = Vec::new();
        let mut status = BacktestStatus::Complete;

        info!(
            assets = table.len(),
            sessions = sessions.len(),
            warmup,
            method = self.allocate.method.as_str(),
            "starting backtest"
        );

        for (i, &date) in sessions.iter().enumerate() {
            if i > 0 {
                value *= 1.0 + self.mark_to_market(table, &weights, sessions[i - 1], date)?;
            }

            let is_rebalance = i + 1 >= warmup && (i + 1 - warmup) % self.config.rebalance_every == 0;
            if is_rebalance {
                if cancel.is_cancelled() {
                    info!(%date, "cancelled at rebalance boundary");
                    status = BacktestStatus::Partial;
                    stats.record_equity(date, value);
                    break;
                }

                let outcome = self.rebalance(table, &weights, value, date, &mut state)?;
                value *= 1.0 - outcome.cost_paid;
                weights = outcome.weights;
                trade_log.extend(outcome.records);
                degradations.extend(outcome.degradations);
            }

            state = transition(state, EngineState::Record);
            stats.record_equity(date, value);
        }

        state = transition(state, EngineState::Finalized);
        debug!(?state, "simulation finished");

        Ok(stats.finalize(
            status,
            self.allocate.method.as_str().to_string(),
            self.config.trading_days_per_year,
            weights,
            trade_log,
            degradations,
        ))
    }

    /// Weighted portfolio return between two sessions. Held assets missing
    /// a bar on either date contribute zero for the interval.
    fn mark_to_market(
        &self,
        table: &PriceTable,
        weights: &WeightVector,
        prev_date: NaiveDate,
        date: NaiveDate,
    ) -> PipelineResult<f64> {
        let view = table.visible_through(date);
        let mut portfolio_return = 0.0;
        for (asset_id, weight) in weights.iter() {
            if weight == 0.0 {
                continue;
            }
            let today = view.bar_on(asset_id, date)?;
            let prev = view.bar_on(asset_id, prev_date)?;
            if let (Some(today), Some(prev)) = (today, prev) {
                if prev.close > 0.0 {
                    portfolio_return += weight * (today.close / prev.close - 1.0);
                }
            }
        }
        Ok(portfolio_return)
    }

    /// One full rebalance: signals, then the bounded optimizer ⇄ gate
    /// retry loop. After a portfolio-level rejection the optimizer
    /// re-solves with the score floor tightened toward higher-conviction,
    /// lower-turnover proposals; on final rejection the prior weights are
    /// carried and the suppressed intents logged.
    fn rebalance(
        &self,
        table: &PriceTable,
        prior: &WeightVector,
        value: f64,
        date: NaiveDate,
        state: &mut EngineState,
    ) -> PipelineResult<RebalanceOutcome> {
        *state = transition(*state, EngineState::LoadWindow);
        let view = table.visible_through(date);

        *state = transition(*state, EngineState::GenerateSignals);
        let signals = self.generator.generate(&view)?;
        let scores = signals.composite_scores();

        let hold = |records: Vec<TradeRecord>, degradations: Vec<Degradation>| RebalanceOutcome {
            weights: prior.carried_to(date),
            records,
            degradations,
            cost_paid: 0.0,
        };

        if scores.is_empty() {
            debug!(%date, "no scorable assets; holding prior weights");
            return Ok(hold(Vec::new(), Vec::new()));
        }
        let candidates: Vec<String> = scores.keys().cloned().collect();

        *state = transition(*state, EngineState::Optimize);
        let covariance = CovarianceMatrix::estimate(&view, &candidates, self.allocate.cov_window)?;

        for attempt in 0..self.config.max_rebalance_attempts {
            let mut alloc_config = self.allocate.clone();
            alloc_config.constraints.score_floor += attempt as f64 * self.config.retry_score_step;

            let allocation = run_allocation(&alloc_config, &scores, &covariance)?;
            let target = allocation.weights;
            let intents = target.diff(prior);
            if intents.is_empty() {
                return Ok(hold(Vec::new(), allocation.degradations));
            }

            *state = transition(*state, EngineState::MetaFilter);
            let (survivors, meta_records) = self.apply_meta_filter(&view, &signals, intents)?;

            *state = transition(*state, EngineState::Gate);
            let liquidity = self.liquidity_of(&view, &survivors)?;
            let report = self.gate.evaluate(&survivors, &scores, value, &liquidity);

            if report.any_executed() {
                *state = transition(*state, EngineState::ApplyTrades);
                let mut next = prior.carried_to(date);
                let mut applied: Vec<(&TradeRecord, f64)> = Vec::new();
                for record in &report.records {
                    if record.outcome.is_executed() {
                        let delta = record.intent.weight_delta;
                        let new_weight = (next.get(&record.intent.asset_id) + delta).max(0.0);
                        next.set(record.intent.asset_id.clone(), new_weight);
                        applied.push((record, delta));
                    }
                }

                // Per-asset gating can execute increases while suppressing
                // the offsetting decreases; scale the increases back into
                // the long-only budget when that overshoots.
                let sum = next.sum();
                if sum > 1.0 + quant_core::WEIGHT_TOLERANCE {
                    let total_increase: f64 =
                        applied.iter().map(|(_, d)| d.max(0.0)).sum();
                    let scale = ((total_increase - (sum - 1.0)) / total_increase).max(0.0);
                    debug!(%date, sum, scale, "scaling executed increases into budget");
                    for (record, delta) in applied.iter_mut() {
                        if *delta > 0.0 {
                            *delta *= scale;
                            let asset_id = &record.intent.asset_id;
                            next.set(asset_id.clone(), (prior.get(asset_id) + *delta).max(0.0));
                        }
                    }
                }

                let mut cost_paid = 0.0;
                for (record, delta) in &applied {
                    let intended = record.intent.turnover();
                    let fill_ratio = if intended > 0.0 {
                        delta.abs() / intended
                    } else {
                        0.0
                    };
                    cost_paid +=
                        record.cost.map(|c| c.total_friction()).unwrap_or(0.0) * fill_ratio;
                }
                next.validate_long_only()?;

                let mut records = meta_records;
                records.extend(report.records);
                return Ok(RebalanceOutcome {
                    weights: next,
                    records,
                    degradations: allocation.degradations,
                    cost_paid,
                });
            }

            if attempt + 1 == self.config.max_rebalance_attempts {
                debug!(%date, attempts = attempt + 1, "rebalance suppressed; holding prior weights");
                let mut records = meta_records;
                records.extend(report.records);
                return Ok(hold(records, allocation.degradations));
            }
            trace!(%date, attempt, "gate rejected proposal; re-solving tighter");
        }

        // The loop always returns on its last attempt.
        unreachable!("bounded rebalance loop exited without a decision")
    }

    /// Apply the meta-filter ahead of the gate. Intents the filter cannot
    /// featurize (history too short for the regime windows) pass through.
    fn apply_meta_filter(
        &self,
        view: &PriceView<'_>,
        signals: &SignalTable,
        intents: Vec<TradeIntent>,
    ) -> PipelineResult<(Vec<TradeIntent>, Vec<TradeRecord>)> {
        let Some(filter) = &self.meta_filter else {
            return Ok((intents, Vec::new()));
        };

        let mut survivors = Vec::new();
        let mut records = Vec::new();
        for intent in intents {
            match TradeFeatures::engineer(view, signals, &intent)? {
                Some(features) => {
                    let probability = filter.probability(&features);
                    if probability >= filter.threshold() {
                        survivors.push(intent);
                    } else {
                        records.push(TradeRecord {
                            intent,
                            cost: None,
                            outcome: TradeOutcome::Suppressed {
                                reason: format!(
                                    "meta-filter {} scored p={probability:.3} below {:.3}",
                                    filter.version(),
                                    filter.threshold()
                                ),
                            },
                        });
                    }
                }
                None => survivors.push(intent),
            }
        }
        Ok((survivors, records))
    }

    /// Average daily dollar volume for each traded asset.
    fn liquidity_of(
        &self,
        view: &PriceView<'_>,
        intents: &[TradeIntent],
    ) -> PipelineResult<std::collections::BTreeMap<String, f64>> {
        let window = self.gate.cost_model().liquidity_window;
        let mut liquidity = std::collections::BTreeMap::new();
        for intent in intents {
            let bars = view.bars(&intent.asset_id)?;
            liquidity.insert(
                intent.asset_id.clone(),
                average_daily_dollar_volume(bars, window),
            );
        }
        Ok(liquidity)
    }
}

/// Advance the state machine. Transitions only move forward within one
/// rebalance cycle; the trace log makes stage ordering auditable.
fn transition(_from: EngineState, to: EngineState) -> EngineState {
    trace!(state = ?to, "pipeline stage");
    to
}

/// Run several independent backtests on blocking worker tasks.
///
/// Each job owns its table and engine — no shared mutable state — and
/// results come back in input order, so the merge is deterministic
/// regardless of completion order. All jobs observe the same cancel token.
pub async fn run_many(
    jobs: Vec<(String, BacktestEngine, PriceTable)>,
    cancel: CancelToken,
) -> Vec<(String, PipelineResult<BacktestResult>)> {
    let mut handles = Vec::with_capacity(jobs.len());
    for (name, engine, table) in jobs {
        let token = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || engine.run(&table, &token));
        handles.push((name, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(PipelineError::Internal(format!(
                "backtest worker failed: {join_error}"
            ))),
        };
        results.push((name, result));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use quant_allocate::AllocationMethod;
    use quant_core::{PriceBar, PriceHistory};
    use quant_gate::{CostModel, GateConfig, SlippageModel};
    use quant_signals::{CompositeWeights, MinHistoryPolicy, SignalConfig};

    fn small_signal_config() -> SignalConfig {
        SignalConfig {
            lookback_long: 40,
            lookback_short: 10,
            risk_free_rate: 0.04,
            trading_days_per_year: 252,
            rsi_period: 7,
            macd_fast: 5,
            macd_slow: 10,
            macd_signal: 3,
            composite: CompositeWeights::default(),
            min_history: MinHistoryPolicy::Strict,
        }
    }

    fn small_engine(gate_threshold: f64) -> BacktestEngine {
        let generator = SignalGenerator::new(small_signal_config()).unwrap();
        let allocate = AllocateConfig {
            method: AllocationMethod::Hrp,
            cov_window: 30,
            ..Default::default()
        };
        let gate = CostGate::new(
            GateConfig {
                min_net_benefit: gate_threshold,
                ..Default::default()
            },
            CostModel {
                commission_rate: 0.0005,
                slippage: SlippageModel::Fixed { bps: 2.0 },
                liquidity_window: 10,
            },
        );
        BacktestEngine::new(BacktestConfig::default(), generator, allocate, gate, None).unwrap()
    }

    fn fixture_table() -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let mut table = PriceTable::new();
        for (asset, drift, wobble) in [
            ("AAPL", 0.0015f64, 0.010f64),
            ("MSFT", 0.0008, 0.008),
            ("XOM", -0.0005, 0.012),
        ] {
            let bars: Vec<PriceBar> = (0..220u64)
                .map(|i| {
                    let close = 100.0
                        * (1.0 + drift).powi(i as i32)
                        * (1.0 + wobble * ((i as f64) * 0.61).sin());
                    PriceBar::new(
                        start + chrono::Days::new(i),
                        close,
                        close * 1.02,
                        close * 0.98,
                        close,
                        2_000_000.0,
                    )
                })
                .collect();
            table.insert(PriceHistory::from_bars(asset, bars).unwrap());
        }
        table
    }

    #[test]
    fn test_run_completes_with_trades() {
        let engine = small_engine(0.0);
        let result = engine.run(&fixture_table(), &CancelToken::new()).unwrap();

        assert_eq!(result.status, BacktestStatus::Complete);
        assert_eq!(result.equity_curve.len(), 220);
        assert!(result.trade_log.iter().any(|r| r.outcome.is_executed()));
        assert!(result.final_weights.validate_long_only().is_ok());
    }

    #[test]
    fn test_determinism_across_runs() {
        let table = fixture_table();
        let first = small_engine(0.0).run(&table, &CancelToken::new()).unwrap();
        let second = small_engine(0.0).run(&table, &CancelToken::new()).unwrap();

        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_prohibitive_threshold_suppresses_all_trades() {
        let engine = small_engine(10.0);
        let result = engine.run(&fixture_table(), &CancelToken::new()).unwrap();

        assert!(result.trade_log.iter().all(|r| !r.outcome.is_executed()));
        assert!(!result.trade_log.is_empty());
        // Nothing ever executed: equity stays at initial capital.
        assert_eq!(result.final_value, result.initial_capital);
    }

    #[test]
    fn test_cancelled_run_is_partial() {
        let engine = small_engine(0.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = engine.run(&fixture_table(), &cancel).unwrap();

        assert_eq!(result.status, BacktestStatus::Partial);
        assert!(result.equity_curve.len() < 220);
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let engine = small_engine(0.0);
        let result = engine.run(&PriceTable::new(), &CancelToken::new());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_many_preserves_input_order() {
        let table = fixture_table();
        let jobs = vec![
            ("first".to_string(), small_engine(0.0), table.clone()),
            ("second".to_string(), small_engine(10.0), table),
        ];
        let results = run_many(jobs, CancelToken::new()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "first");
        assert_eq!(results[1].0, "second");
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }
}
