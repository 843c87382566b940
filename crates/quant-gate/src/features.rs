//! Trade feature engineering for the meta-filter.

use quant_core::{PipelineError, PriceView, SignalKind, SignalTable, TradeIntent};
use serde::{Deserialize, Serialize};

/// Sessions of rolling volatility behind the regime flags.
const REGIME_VOL_WINDOW: usize = 21;
/// Sessions over which the average volatility baseline is taken.
const REGIME_BASELINE_WINDOW: usize = 126;
/// Sessions of the trend-defining moving average.
const REGIME_TREND_WINDOW: usize = 50;
/// Rolling vol above this multiple of its baseline marks a high-vol regime.
const HIGH_VOL_MULTIPLE: f64 = 1.5;

/// Engineered features for one intent, in the fixed order the model
/// artifact's scaler expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeFeatures {
    /// Composite signal strength of the traded asset
    pub signal_strength: f64,
    /// Trailing realized volatility (per-session) of the traded asset
    pub realized_vol: f64,
    /// Trend regime: last close relative to its moving average, as a
    /// fractional distance (positive in an uptrend)
    pub regime_trend: f64,
    /// High-volatility regime flag (1.0 or 0.0)
    pub regime_high_vol: f64,
}

impl TradeFeatures {
    /// Canonical feature names matching the struct field order.
    pub const NAMES: [&'static str; 4] = [
        "signal_strength",
        "realized_vol",
        "regime_trend",
        "regime_high_vol",
    ];

    /// Feature values in canonical order.
    pub fn vector(&self) -> [f64; 4] {
        [
            self.signal_strength,
            self.realized_vol,
            self.regime_trend,
            self.regime_high_vol,
        ]
    }

    /// Engineer features for one intent from the point-in-time view.
    ///
    /// Returns `None` when the asset's visible history is too short for
    /// the regime windows — the caller treats such intents as unfilterable
    /// and passes them through to the cost gate.
    pub fn engineer(
        view: &PriceView<'_>,
        signals: &SignalTable,
        intent: &TradeIntent,
    ) -> Result<Option<Self>, PipelineError> {
        let bars = view.bars(&intent.asset_id)?;
        if bars.len() < REGIME_TREND_WINDOW.max(REGIME_VOL_WINDOW + 1) {
            return Ok(None);
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let signal_strength = signals
            .value(&intent.asset_id, SignalKind::Composite)
            .unwrap_or(0.0);

        let realized_vol = rolling_vol(&closes, REGIME_VOL_WINDOW);

        let sma: f64 = closes[closes.len() - REGIME_TREND_WINDOW..]
            .iter()
            .sum::<f64>()
            / REGIME_TREND_WINDOW as f64;
        let last = *closes.last().unwrap_or(&0.0);
        let regime_trend = if sma > 0.0 { last / sma - 1.0 } else { 0.0 };

        // High-vol flag: current rolling vol vs its longer-run average.
        let baseline_len = closes.len().min(REGIME_BASELINE_WINDOW + 1);
        let baseline_closes = &closes[closes.len() - baseline_len..];
        let baseline = rolling_vol(baseline_closes, baseline_len.saturating_sub(1).max(2));
        let regime_high_vol = if baseline > 0.0 && realized_vol > HIGH_VOL_MULTIPLE * baseline {
            1.0
        } else {
            0.0
        };

        Ok(Some(Self {
            signal_strength,
            realized_vol,
            regime_trend,
            regime_high_vol,
        }))
    }
}

/// Per-session return volatility over the last `window` returns.
fn rolling_vol(closes: &[f64], window: usize) -> f64 {
    if closes.len() < window + 1 || window < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = closes[closes.len() - window - 1..]
        .windows(2)
        .map(|p| if p[0] > 0.0 { p[1] / p[0] - 1.0 } else { 0.0 })
        .collect();
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt()
}
