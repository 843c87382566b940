//! Composite score construction.

use quant_core::SignalError;
use serde::{Deserialize, Serialize};

/// MACD histogram normalization: histogram / close is scaled so that a 2%
/// divergence saturates the [-1, 1] range.
const MACD_NORM_SCALE: f64 = 50.0;

/// Weights of the composite blend.
///
/// These are configuration, not constants: the blend can be re-weighted
/// without touching any signal math. Defaults follow the reference
/// configuration (momentum 0.5, technical 0.3, low-vol 0.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    /// Weight on the relative-momentum component
    pub momentum: f64,
    /// Weight on the RSI/MACD technical component
    pub technical: f64,
    /// Weight on the low-volatility preference component
    pub low_vol: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            momentum: 0.5,
            technical: 0.3,
            low_vol: 0.2,
        }
    }
}

impl CompositeWeights {
    /// Validate: all components non-negative with a positive sum.
    pub fn validate(&self) -> Result<(), SignalError> {
        let parts = [self.momentum, self.technical, self.low_vol];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(SignalError::InvalidConfig(
                "composite weights must be non-negative".to_string(),
            ));
        }
        if parts.iter().sum::<f64>() <= 0.0 {
            return Err(SignalError::InvalidConfig(
                "composite weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Blend normalized sub-signals into one score.
    ///
    /// Inputs are expected in [-1, 1]; the output is the weight-normalized
    /// blend, also in [-1, 1].
    pub fn blend(&self, momentum: f64, technical: f64, low_vol: f64) -> f64 {
        let total = self.momentum + self.technical + self.low_vol;
        (self.momentum * momentum + self.technical * technical + self.low_vol * low_vol) / total
    }
}

/// Map an RSI reading to [-1, 1].
///
/// 50 maps to 0; the distance from the midpoint is scaled so the
/// conventional 30/70 bands land at -0.4/+0.4.
pub fn rsi_score(rsi: f64) -> f64 {
    ((rsi - 50.0) / 50.0).clamp(-1.0, 1.0)
}

/// Map a MACD histogram to [-1, 1], normalized by price level so the score
/// is comparable across assets.
pub fn macd_score(histogram: f64, close: f64) -> f64 {
    if close <= 0.0 {
        return 0.0;
    }
    (histogram / close * MACD_NORM_SCALE).clamp(-1.0, 1.0)
}

/// Technical composite: equal blend of RSI and MACD scores.
pub fn technical_score(rsi: f64, macd_histogram: f64, close: f64) -> f64 {
    0.5 * rsi_score(rsi) + 0.5 * macd_score(macd_histogram, close)
}

/// Map a [0, 1] cross-sectional rank to [-1, 1].
pub fn centered(rank: f64) -> f64 {
    (rank * 2.0 - 1.0).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_validate() {
        assert!(CompositeWeights::default().validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let weights = CompositeWeights {
            momentum: -0.5,
            technical: 0.3,
            low_vol: 0.2,
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_blend_normalizes_by_weight_sum() {
        let weights = CompositeWeights {
            momentum: 1.0,
            technical: 1.0,
            low_vol: 0.0,
        };
        let score = weights.blend(1.0, 0.0, 0.7);
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_score_midpoint_and_bands() {
        assert_eq!(rsi_score(50.0), 0.0);
        assert!((rsi_score(70.0) - 0.4).abs() < 1e-12);
        assert!((rsi_score(30.0) + 0.4).abs() < 1e-12);
        assert_eq!(rsi_score(200.0), 1.0);
    }

    #[test]
    fn test_macd_score_saturates() {
        assert!(macd_score(10.0, 100.0) >= 1.0 - 1e-12);
        assert!(macd_score(-10.0, 100.0) <= -1.0 + 1e-12);
        assert_eq!(macd_score(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_centered_rank() {
        assert_eq!(centered(0.0), -1.0);
        assert_eq!(centered(0.5), 0.0);
        assert_eq!(centered(1.0), 1.0);
    }
}
