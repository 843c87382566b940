//! Statistical validation of backtest results.
//!
//! Probabilistic and Deflated Sharpe Ratios guard against the two classic
//! backtest sins: mistaking estimation noise for skill, and cherry-picking
//! the best of many trials. These run offline over a finished result, not
//! in the simulation hot path.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Euler–Mascheroni constant, used in the expected-maximum approximation.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Per-period (non-annualized) Sharpe ratio of a return series.
pub fn estimated_sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    if variance <= 0.0 {
        return 0.0;
    }
    mean / variance.sqrt()
}

/// Standard error of the Sharpe estimate (Mertens), accounting for the
/// skewness and kurtosis of the return distribution.
pub fn sharpe_ratio_std(returns: &[f64]) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }
    let sr = estimated_sharpe_ratio(returns);
    let nf = n as f64;
    let mean = returns.iter().sum::<f64>() / nf;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / nf;
    if variance <= 0.0 {
        return 0.0;
    }
    let std_dev = variance.sqrt();
    let skew = returns
        .iter()
        .map(|r| ((r - mean) / std_dev).powi(3))
        .sum::<f64>()
        / nf;
    let kurtosis = returns
        .iter()
        .map(|r| ((r - mean) / std_dev).powi(4))
        .sum::<f64>()
        / nf;

    let var_sr = (1.0 - skew * sr + (kurtosis - 1.0) / 4.0 * sr.powi(2)) / (nf - 1.0);
    var_sr.max(0.0).sqrt()
}

/// Probability that the true Sharpe exceeds `benchmark_sr`, given the
/// observed per-period Sharpe and its standard error.
pub fn probabilistic_sharpe_ratio(observed_sr: f64, benchmark_sr: f64, sr_std: f64) -> f64 {
    if sr_std <= 0.0 {
        return if observed_sr > benchmark_sr { 1.0 } else { 0.0 };
    }
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    normal.cdf((observed_sr - benchmark_sr) / sr_std)
}

/// Deflated Sharpe Ratio: PSR against the expected maximum Sharpe of
/// `n_trials` unskilled strategies.
///
/// The expected maximum uses the standard Gumbel-type approximation; with
/// one trial it degenerates to the plain PSR against zero.
pub fn deflated_sharpe_ratio(observed_sr: f64, n_trials: usize, returns: &[f64]) -> f64 {
    let sr_std = sharpe_ratio_std(returns);
    if sr_std <= 0.0 {
        return 0.0;
    }
    let benchmark = if n_trials > 1 {
        let normal = Normal::new(0.0, 1.0).expect("unit normal");
        let n = n_trials as f64;
        let z1 = normal.inverse_cdf(1.0 - 1.0 / n);
        let z2 = normal.inverse_cdf(1.0 - 1.0 / (n * std::f64::consts::E));
        sr_std * ((1.0 - EULER_GAMMA) * z1 + EULER_GAMMA * z2)
    } else {
        0.0
    };
    probabilistic_sharpe_ratio(observed_sr, benchmark, sr_std)
}

/// Summary of a validation pass over one run's daily returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestValidation {
    /// Annualized Sharpe ratio
    pub sharpe_annual: f64,
    /// Probabilistic Sharpe Ratio
    pub probabilistic_sr: f64,
    /// Deflated Sharpe Ratio over the declared trial count
    pub deflated_sr: f64,
    /// Trials the deflation accounted for
    pub n_trials: usize,
    /// Whether the deflated probability clears the significance bar
    pub is_significant: bool,
}

/// Significance bar on the deflated Sharpe probability.
const SIGNIFICANCE_LEVEL: f64 = 0.95;

/// Validate a completed backtest from its daily returns.
///
/// `n_trials` is the number of strategy variations that were evaluated
/// before settling on this one — understating it overstates significance.
pub fn validate_backtest(
    returns: &[f64],
    n_trials: usize,
    benchmark_sr: f64,
    trading_days_per_year: usize,
) -> BacktestValidation {
    let sr = estimated_sharpe_ratio(returns);
    let sr_std = sharpe_ratio_std(returns);
    let psr = probabilistic_sharpe_ratio(sr, benchmark_sr, sr_std);
    let dsr = deflated_sharpe_ratio(sr, n_trials.max(1), returns);

    BacktestValidation {
        sharpe_annual: sr * (trading_days_per_year as f64).sqrt(),
        probabilistic_sr: psr,
        deflated_sr: dsr,
        n_trials: n_trials.max(1),
        is_significant: dsr > SIGNIFICANCE_LEVEL,
    }
}
