//! The signal generator: price view in, signal table out.

use chrono::NaiveDate;
use quant_core::{PipelineError, PriceBar, PriceView, SignalError, SignalKind, SignalRow, SignalTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composite::{self, CompositeWeights};
use crate::indicators::{Indicator, Macd, RollingStd, Rsi};
use crate::ranking::average_rank;

/// What to do when an asset's visible history is shorter than the lookback
/// requires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MinHistoryPolicy {
    /// Fail the asset (it is excluded from the table) rather than compute
    /// on a shorter, undeclared window.
    Strict,
    /// Accept a shorter window down to `min_bars` bars.
    AllowPartial { min_bars: usize },
}

/// Signal generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Trailing-return lookback in sessions
    pub lookback_long: usize,
    /// Realized-volatility lookback in sessions
    pub lookback_short: usize,
    /// Annual risk-free rate used as the absolute-momentum benchmark
    pub risk_free_rate: f64,
    /// Sessions per year, for de-annualizing the risk-free rate
    pub trading_days_per_year: usize,
    /// RSI period
    pub rsi_period: usize,
    /// MACD fast EMA period
    pub macd_fast: usize,
    /// MACD slow EMA period
    pub macd_slow: usize,
    /// MACD signal EMA period
    pub macd_signal: usize,
    /// Composite blend weights
    pub composite: CompositeWeights,
    /// Minimum-history policy
    pub min_history: MinHistoryPolicy,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            lookback_long: 252,
            lookback_short: 21,
            risk_free_rate: 0.04,
            trading_days_per_year: 252,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            composite: CompositeWeights::default(),
            min_history: MinHistoryPolicy::Strict,
        }
    }
}

impl SignalConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.lookback_long < 2 || self.lookback_short < 2 {
            return Err(SignalError::InvalidConfig(
                "lookbacks must be at least 2 sessions".to_string(),
            ));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(SignalError::InvalidConfig(
                "MACD fast period must be below the slow period".to_string(),
            ));
        }
        if self.trading_days_per_year == 0 {
            return Err(SignalError::InvalidConfig(
                "trading_days_per_year must be positive".to_string(),
            ));
        }
        if let MinHistoryPolicy::AllowPartial { min_bars } = self.min_history {
            if min_bars < 2 {
                return Err(SignalError::InvalidConfig(
                    "min_bars must be at least 2".to_string(),
                ));
            }
        }
        self.composite.validate()
    }

    /// Bars needed for a full-window signal on one asset.
    pub fn required_bars(&self) -> usize {
        (self.lookback_long + 1)
            .max(self.macd_slow + self.macd_signal)
            .max(self.rsi_period + 1)
            .max(self.lookback_short + 1)
    }
}

/// Per-asset values computed before cross-sectional ranking.
struct AssetSnapshot {
    asset_id: String,
    trailing_return: f64,
    technical: f64,
    realized_vol: f64,
}

/// Pure signal generator over point-in-time views.
pub struct SignalGenerator {
    config: SignalConfig,
    rsi: Rsi,
    macd: Macd,
    vol: RollingStd,
}

impl SignalGenerator {
    /// Create a generator from a validated configuration.
    pub fn new(config: SignalConfig) -> Result<Self, SignalError> {
        config.validate()?;
        Ok(Self {
            rsi: Rsi::new(config.rsi_period),
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal),
            vol: RollingStd::new(config.lookback_short),
            config,
        })
    }

    /// The generator's configuration.
    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Produce the signal table for the view's clock date.
    ///
    /// Assets without sufficient usable history are excluded from the
    /// table entirely — they never appear in the cross-sectional ranks and
    /// are never zero-filled. Exclusion is the only recovery performed
    /// here; every other failure propagates.
    pub fn generate(&self, view: &PriceView<'_>) -> Result<SignalTable, PipelineError> {
        let date = view.clock();
        let sessions = view.sessions();
        let mut table = SignalTable::new(date);
        let mut snapshots: Vec<AssetSnapshot> = Vec::new();

        for asset_id in view.tradeable_assets() {
            let bars = view.bars(asset_id)?;
            let window = match self.usable_window(asset_id, bars, &sessions) {
                Ok(window) => window,
                Err(SignalError::InsufficientHistory {
                    required,
                    available,
                    ..
                }) => {
                    debug!(
                        asset_id,
                        required, available, "excluding asset: insufficient history"
                    );
                    continue;
                }
                Err(other) => return Err(other.into()),
            };
            snapshots.push(self.snapshot(asset_id, window)?);
        }

        if snapshots.is_empty() {
            return Ok(table);
        }

        let trailing: Vec<(String, f64)> = snapshots
            .iter()
            .map(|s| (s.asset_id.clone(), s.trailing_return))
            .collect();
        let vols: Vec<(String, f64)> = snapshots
            .iter()
            .map(|s| (s.asset_id.clone(), s.realized_vol))
            .collect();
        let momentum_ranks = average_rank(&trailing);
        let vol_ranks = average_rank(&vols);

        for snapshot in &snapshots {
            let asset_id = &snapshot.asset_id;
            let momentum_rank = momentum_ranks[asset_id];
            // Low volatility is preferred: invert the volatility rank.
            let low_vol_rank = 1.0 - vol_ranks[asset_id];
            let composite_score = self.config.composite.blend(
                composite::centered(momentum_rank),
                snapshot.technical,
                composite::centered(low_vol_rank),
            );

            for (signal, value) in [
                (
                    SignalKind::AbsoluteMomentum,
                    snapshot.trailing_return - self.benchmark_return(),
                ),
                (SignalKind::RelativeMomentum, momentum_rank),
                (SignalKind::TechnicalComposite, snapshot.technical),
                (SignalKind::Composite, composite_score),
            ] {
                table.insert(SignalRow {
                    asset_id: asset_id.clone(),
                    date,
                    signal,
                    value,
                });
            }
        }

        Ok(table)
    }

    /// Risk-free return over the trailing-return span.
    fn benchmark_return(&self) -> f64 {
        let years = self.config.lookback_long as f64 / self.config.trading_days_per_year as f64;
        (1.0 + self.config.risk_free_rate).powf(years) - 1.0
    }

    /// Select the trailing window for an asset, enforcing the
    /// minimum-history policy.
    ///
    /// A gap — a session where the rest of the universe traded but this
    /// asset has no bar — silently stretches a count-based window further
    /// into the past, so under the strict policy a gapped window is
    /// rejected the same way a short one is.
    fn usable_window<'b>(
        &self,
        asset_id: &str,
        bars: &'b [PriceBar],
        sessions: &[NaiveDate],
    ) -> Result<&'b [PriceBar], SignalError> {
        let required = self.config.required_bars();

        if bars.len() < required {
            return match self.config.min_history {
                MinHistoryPolicy::AllowPartial { min_bars } if bars.len() >= min_bars => Ok(bars),
                _ => Err(SignalError::InsufficientHistory {
                    asset_id: asset_id.to_string(),
                    required,
                    available: bars.len(),
                }),
            };
        }

        let window = &bars[bars.len() - required..];
        let span_start = window[0].date;
        let expected = sessions.iter().filter(|d| **d >= span_start).count();
        if expected > window.len() {
            // The window spans more sessions than it holds bars for.
            return match self.config.min_history {
                MinHistoryPolicy::AllowPartial { min_bars } if window.len() >= min_bars => {
                    Ok(window)
                }
                _ => Err(SignalError::InsufficientHistory {
                    asset_id: asset_id.to_string(),
                    required: expected,
                    available: window.len(),
                }),
            };
        }

        Ok(window)
    }

    fn snapshot(&self, asset_id: &str, window: &[PriceBar]) -> Result<AssetSnapshot, PipelineError> {
        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        let first = closes.first().copied().unwrap_or(0.0);
        let last = closes.last().copied().unwrap_or(0.0);
        if first <= 0.0 {
            return Err(SignalError::InvalidConfig(format!(
                "non-positive close for {asset_id} at window start"
            ))
            .into());
        }
        let trailing_return = last / first - 1.0;

        let rsi = self.rsi.last(&closes).unwrap_or(50.0);
        let macd_histogram = self.macd.last(&closes).map(|p| p.histogram).unwrap_or(0.0);
        let technical = composite::technical_score(rsi, macd_histogram, last);
        let realized_vol = self.vol.last(&closes).unwrap_or(0.0);

        Ok(AssetSnapshot {
            asset_id: asset_id.to_string(),
            trailing_return,
            technical,
            realized_vol,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quant_core::{PriceHistory, PriceTable};

    fn test_config() -> SignalConfig {
        SignalConfig {
            lookback_long: 40,
            lookback_short: 10,
            rsi_period: 7,
            macd_fast: 5,
            macd_slow: 10,
            macd_signal: 3,
            ..Default::default()
        }
    }

    fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                PriceBar::new(
                    start + chrono::Days::new(i as u64),
                    close,
                    close * 1.01,
                    close * 0.99,
                    close,
                    1_000_000.0,
                )
            })
            .collect()
    }

    fn trending(start_price: f64, daily: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start_price * (1.0 + daily).powi(i as i32)).collect()
    }

    fn table_of(histories: Vec<(&str, Vec<PriceBar>)>) -> PriceTable {
        histories
            .into_iter()
            .map(|(id, bars)| PriceHistory::from_bars(id, bars).unwrap())
            .collect()
    }

    #[test]
    fn test_generates_all_signal_kinds() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let table = table_of(vec![
            ("AAPL", daily_bars(start, &trending(100.0, 0.002, 60))),
            ("MSFT", daily_bars(start, &trending(200.0, -0.001, 60))),
        ]);
        let clock = start + chrono::Days::new(59);
        let generator = SignalGenerator::new(test_config()).unwrap();

        let signals = generator.generate(&table.visible_through(clock)).unwrap();
        for kind in [
            SignalKind::AbsoluteMomentum,
            SignalKind::RelativeMomentum,
            SignalKind::TechnicalComposite,
            SignalKind::Composite,
        ] {
            assert!(signals.value("AAPL", kind).is_some(), "missing {kind:?}");
            assert!(signals.value("MSFT", kind).is_some(), "missing {kind:?}");
        }
        // The uptrending asset outranks the downtrending one.
        assert!(
            signals.value("AAPL", SignalKind::RelativeMomentum).unwrap()
                > signals.value("MSFT", SignalKind::RelativeMomentum).unwrap()
        );
    }

    #[test]
    fn test_late_listing_asset_excluded_then_included() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let full = daily_bars(start, &trending(100.0, 0.001, 300));
        // The late asset lists 100 sessions in.
        let late_start = start + chrono::Days::new(100);
        let late = daily_bars(late_start, &trending(50.0, 0.001, 200));

        let table = table_of(vec![
            ("EARLY1", full.clone()),
            ("EARLY2", full.clone()),
            ("LATE", late),
        ]);
        let generator = SignalGenerator::new(test_config()).unwrap();
        let required = generator.config().required_bars();

        // Before the late asset accrues its lookback it is excluded.
        let before = start + chrono::Days::new((100 + required - 2) as u64);
        let signals = generator.generate(&table.visible_through(before)).unwrap();
        assert!(signals.value("LATE", SignalKind::RelativeMomentum).is_none());
        assert!(signals.value("EARLY1", SignalKind::RelativeMomentum).is_some());

        // Once it has the bars, it participates.
        let after = start + chrono::Days::new((100 + required) as u64);
        let signals = generator.generate(&table.visible_through(after)).unwrap();
        assert!(signals.value("LATE", SignalKind::RelativeMomentum).is_some());
    }

    #[test]
    fn test_gap_rejected_under_strict_policy() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let clean = daily_bars(start, &trending(100.0, 0.001, 60));
        // Same span, but 5 sessions missing from the middle of the window.
        let mut gapped = clean.clone();
        gapped.drain(40..45);

        let table = table_of(vec![("CLEAN", clean), ("GAPPED", gapped)]);
        let clock = start + chrono::Days::new(59);
        let generator = SignalGenerator::new(test_config()).unwrap();

        let signals = generator.generate(&table.visible_through(clock)).unwrap();
        assert!(signals.value("CLEAN", SignalKind::Composite).is_some());
        assert!(signals.value("GAPPED", SignalKind::Composite).is_none());
    }

    #[test]
    fn test_gap_allowed_under_partial_policy() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let clean = daily_bars(start, &trending(100.0, 0.001, 60));
        let mut gapped = clean.clone();
        gapped.drain(40..45);

        let table = table_of(vec![("CLEAN", clean), ("GAPPED", gapped)]);
        let clock = start + chrono::Days::new(59);

        let mut config = test_config();
        config.min_history = MinHistoryPolicy::AllowPartial { min_bars: 30 };
        let generator = SignalGenerator::new(config).unwrap();

        let signals = generator.generate(&table.visible_through(clock)).unwrap();
        assert!(signals.value("GAPPED", SignalKind::Composite).is_some());
    }

    #[test]
    fn test_lookahead_invariance() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let closes = trending(100.0, 0.002, 60);
        let table = table_of(vec![
            ("AAPL", daily_bars(start, &closes)),
            ("MSFT", daily_bars(start, &trending(200.0, 0.001, 60))),
        ]);
        let clock = start + chrono::Days::new(59);
        let generator = SignalGenerator::new(test_config()).unwrap();
        let baseline = generator.generate(&table.visible_through(clock)).unwrap();

        // Append 30 future sessions to every asset; signals at the clock
        // must not move.
        let mut extended_closes = closes.clone();
        extended_closes.extend(trending(*closes.last().unwrap() * 5.0, 0.01, 30));
        let extended = table_of(vec![
            ("AAPL", daily_bars(start, &extended_closes)),
            (
                "MSFT",
                daily_bars(start, &trending(200.0, 0.001, 90)),
            ),
        ]);
        let with_future = generator.generate(&extended.visible_through(clock)).unwrap();

        assert_eq!(baseline, with_future);
    }

    #[test]
    fn test_idempotent_recomputation() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let table = table_of(vec![("AAPL", daily_bars(start, &trending(100.0, 0.002, 60)))]);
        let clock = start + chrono::Days::new(59);
        let generator = SignalGenerator::new(test_config()).unwrap();

        let first = generator.generate(&table.visible_through(clock)).unwrap();
        let second = generator.generate(&table.visible_through(clock)).unwrap();
        assert_eq!(first, second);
    }
}
