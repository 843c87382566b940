//! Volatility indicators.

use super::Indicator;

/// Rolling standard deviation of simple returns.
///
/// Values are per-period (daily); annualization is the caller's concern so
/// the trading-days constant lives in exactly one place.
#[derive(Debug, Clone)]
pub struct RollingStd {
    period: usize,
}

impl RollingStd {
    /// Create a rolling standard deviation over `period` returns.
    pub fn new(period: usize) -> Self {
        assert!(period > 1, "RollingStd period must be greater than 1");
        Self { period }
    }

    fn returns(closes: &[f64]) -> Vec<f64> {
        closes
            .windows(2)
            .map(|pair| {
                if pair[0] == 0.0 {
                    0.0
                } else {
                    pair[1] / pair[0] - 1.0
                }
            })
            .collect()
    }
}

impl Indicator for RollingStd {
    fn calculate(&self, closes: &[f64]) -> Vec<f64> {
        let returns = Self::returns(closes);
        if returns.len() < self.period {
            return vec![];
        }

        let period_f64 = self.period as f64;
        returns
            .windows(self.period)
            .map(|window| {
                let mean: f64 = window.iter().sum::<f64>() / period_f64;
                let variance: f64 =
                    window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / period_f64;
                variance.sqrt()
            })
            .collect()
    }

    fn min_len(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &'static str {
        "RollingStd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_prices_zero_vol() {
        let closes = vec![100.0; 30];
        let std = RollingStd::new(21);
        let last = std.last(&closes).unwrap();
        assert!(last.abs() < 1e-12);
    }

    #[test]
    fn test_volatile_series_greater_than_calm() {
        let calm: Vec<f64> = (0..40).map(|i| 100.0 + 0.01 * i as f64).collect();
        let wild: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 2 == 0 { 5.0 } else { -5.0 })
            .collect();

        let std = RollingStd::new(21);
        assert!(std.last(&wild).unwrap() > std.last(&calm).unwrap());
    }

    #[test]
    fn test_short_input_is_empty() {
        let closes = vec![100.0; 10];
        let std = RollingStd::new(21);
        assert!(std.calculate(&closes).is_empty());
    }
}
