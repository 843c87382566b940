//! Momentum oscillators: RSI and MACD.

use super::Indicator;

/// Relative Strength Index using Wilder's smoothing.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    /// Create a new RSI. The conventional period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "RSI period must be greater than 0");
        Self { period }
    }

    /// Wilder smoothing: avg = (prev_avg * (period - 1) + value) / period.
    fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
        if values.len() < period {
            return vec![];
        }
        let period_f64 = period as f64;
        let mut result = Vec::with_capacity(values.len() - period + 1);

        let mut avg: f64 = values[..period].iter().sum::<f64>() / period_f64;
        result.push(avg);
        for &value in &values[period..] {
            avg = (avg * (period_f64 - 1.0) + value) / period_f64;
            result.push(avg);
        }
        result
    }
}

impl Indicator for Rsi {
    fn calculate(&self, closes: &[f64]) -> Vec<f64> {
        if closes.len() <= self.period {
            return vec![];
        }

        let mut gains = Vec::with_capacity(closes.len() - 1);
        let mut losses = Vec::with_capacity(closes.len() - 1);
        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        let avg_gains = Self::wilder_smooth(&gains, self.period);
        let avg_losses = Self::wilder_smooth(&losses, self.period);

        avg_gains
            .iter()
            .zip(avg_losses.iter())
            .map(|(&gain, &loss)| {
                if loss == 0.0 {
                    100.0
                } else {
                    100.0 - 100.0 / (1.0 + gain / loss)
                }
            })
            .collect()
    }

    fn min_len(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &'static str {
        "RSI"
    }
}

/// One MACD observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    /// Fast EMA minus slow EMA
    pub macd: f64,
    /// EMA of the MACD line
    pub signal: f64,
    /// MACD minus signal
    pub histogram: f64,
}

/// Moving Average Convergence Divergence.
#[derive(Debug, Clone)]
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Macd {
    /// Create a MACD with explicit periods. The conventional setup is
    /// (12, 26, 9).
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        assert!(
            fast_period < slow_period,
            "MACD fast period must be below the slow period"
        );
        assert!(signal_period > 0, "MACD signal period must be greater than 0");
        Self {
            fast_period,
            slow_period,
            signal_period,
        }
    }

    fn ema(values: &[f64], period: usize) -> Vec<f64> {
        if values.len() < period {
            return vec![];
        }
        let alpha = 2.0 / (period as f64 + 1.0);
        let mut result = Vec::with_capacity(values.len() - period + 1);

        let mut ema: f64 = values[..period].iter().sum::<f64>() / period as f64;
        result.push(ema);
        for &value in &values[period..] {
            ema = alpha * value + (1.0 - alpha) * ema;
            result.push(ema);
        }
        result
    }

    /// MACD line, signal line and histogram for the input series.
    pub fn calculate_series(&self, closes: &[f64]) -> Vec<MacdPoint> {
        let fast = Self::ema(closes, self.fast_period);
        let slow = Self::ema(closes, self.slow_period);
        if slow.is_empty() {
            return vec![];
        }

        // The slow EMA starts later; align the fast EMA to its tail.
        let offset = fast.len() - slow.len();
        let macd_line: Vec<f64> = slow
            .iter()
            .enumerate()
            .map(|(i, &s)| fast[i + offset] - s)
            .collect();

        let signal_line = Self::ema(&macd_line, self.signal_period);
        if signal_line.is_empty() {
            return vec![];
        }

        let macd_offset = macd_line.len() - signal_line.len();
        signal_line
            .iter()
            .enumerate()
            .map(|(i, &signal)| {
                let macd = macd_line[i + macd_offset];
                MacdPoint {
                    macd,
                    signal,
                    histogram: macd - signal,
                }
            })
            .collect()
    }

    /// The most recent MACD observation, if computable.
    pub fn last(&self, closes: &[f64]) -> Option<MacdPoint> {
        self.calculate_series(closes).last().copied()
    }

    /// Minimum input length for one observation.
    pub fn min_len(&self) -> usize {
        self.slow_period + self.signal_period
    }
}
