//! Point-in-time covariance and correlation estimation.

use chrono::NaiveDate;
use quant_core::{AllocateError, PriceView};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sample covariance of daily log returns over a trailing window, estimated
/// from the same point-in-time view the signals were computed from.
///
/// Assets are stored in ascending id order; every consumer indexes through
/// [`CovarianceMatrix::assets`] so row order is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    as_of: NaiveDate,
    assets: Vec<String>,
    matrix: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    /// Estimate from a price view over the last `window` returns.
    ///
    /// Candidate assets without `window + 1` visible bars are skipped (and
    /// logged): they cannot be allocated this rebalance. Candidates must be
    /// supplied in ascending order.
    pub fn estimate(
        view: &PriceView<'_>,
        candidates: &[String],
        window: usize,
    ) -> Result<Self, AllocateError> {
        if window < 2 {
            return Err(AllocateError::InvalidInput(
                "covariance window must be at least 2".to_string(),
            ));
        }

        let mut assets = Vec::new();
        let mut returns: Vec<Vec<f64>> = Vec::new();
        for asset_id in candidates {
            let closes = view
                .closes(asset_id, window + 1)
                .map_err(|e| AllocateError::InvalidInput(e.to_string()))?;
            if closes.len() < window + 1 {
                debug!(
                    asset_id,
                    have = closes.len(),
                    need = window + 1,
                    "skipping asset in covariance estimate"
                );
                continue;
            }
            let series: Vec<f64> = closes.windows(2).map(|p| (p[1] / p[0]).ln()).collect();
            assets.push(asset_id.clone());
            returns.push(series);
        }

        if assets.is_empty() {
            return Err(AllocateError::InvalidInput(
                "no asset has enough history for covariance estimation".to_string(),
            ));
        }

        let n = assets.len();
        let t = window as f64;
        let means: Vec<f64> = returns.iter().map(|r| r.iter().sum::<f64>() / t).collect();

        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let cov = returns[i]
                    .iter()
                    .zip(returns[j].iter())
                    .map(|(a, b)| (a - means[i]) * (b - means[j]))
                    .sum::<f64>()
                    / t;
                matrix[i][j] = cov;
                matrix[j][i] = cov;
            }
        }

        Ok(Self {
            as_of: view.clock(),
            assets,
            matrix,
        })
    }

    /// Build directly from parts (used by tests and callers with their own
    /// estimator).
    pub fn from_parts(
        as_of: NaiveDate,
        assets: Vec<String>,
        matrix: Vec<Vec<f64>>,
    ) -> Result<Self, AllocateError> {
        let n = assets.len();
        if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
            return Err(AllocateError::InvalidInput(format!(
                "covariance matrix shape does not match {n} assets"
            )));
        }
        if matrix
            .iter()
            .any(|row| row.iter().any(|v| !v.is_finite()))
        {
            return Err(AllocateError::InvalidInput(
                "covariance matrix contains non-finite entries".to_string(),
            ));
        }
        Ok(Self {
            as_of,
            assets,
            matrix,
        })
    }

    /// The estimation date.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Asset ids, ascending.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Matrix dimension.
    pub fn dimension(&self) -> usize {
        self.assets.len()
    }

    /// Covariance entry by index.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[i][j]
    }

    /// Variance of asset `i`.
    pub fn variance(&self, i: usize) -> f64 {
        self.matrix[i][i]
    }

    /// Full matrix rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    /// Pearson correlation matrix derived from the covariance.
    ///
    /// Zero-variance assets correlate 0 with everything (and 1 with
    /// themselves) so downstream distances stay finite.
    pub fn correlation(&self) -> Vec<Vec<f64>> {
        let n = self.dimension();
        let mut corr = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    corr[i][j] = 1.0;
                    continue;
                }
                let denom = (self.variance(i) * self.variance(j)).sqrt();
                corr[i][j] = if denom > 0.0 {
                    (self.matrix[i][j] / denom).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
            }
        }
        corr
    }

    /// Restrict to a subset of asset indices (used by cluster math).
    pub fn portfolio_variance(&self, indices: &[usize], weights: &[f64]) -> f64 {
        let mut variance = 0.0;
        for (a, &i) in indices.iter().enumerate() {
            for (b, &j) in indices.iter().enumerate() {
                variance += weights[a] * weights[b] * self.matrix[i][j];
            }
        }
        variance
    }
}
