//! Unconstrained mean-variance allocation.

use std::collections::BTreeMap;

use quant_core::{AllocateError, WeightVector};

use crate::constraints::Constraints;
use crate::covariance::CovarianceMatrix;
use crate::Allocator;

/// Pivot threshold relative to the largest diagonal entry; anything below
/// it means the covariance is singular for our purposes.
const PIVOT_RATIO: f64 = 1e-10;

/// Classic mean-variance allocator: w ∝ Σ⁻¹μ with composite scores as the
/// expected-return proxy, negatives clipped for the long-only contract.
///
/// The solve can legitimately fail on an ill-conditioned covariance; the
/// caller is expected to fall back to the default method and record the
/// degradation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanVarianceAllocator;

impl Allocator for MeanVarianceAllocator {
    fn name(&self) -> &'static str {
        "mean_variance"
    }

    fn optimize(
        &self,
        scores: &BTreeMap<String, f64>,
        covariance: &CovarianceMatrix,
        constraints: &Constraints,
    ) -> Result<WeightVector, AllocateError> {
        let selected: Vec<usize> = covariance
            .assets()
            .iter()
            .enumerate()
            .filter(|(_, id)| scores.get(*id).is_some_and(|s| *s > constraints.score_floor))
            .map(|(i, _)| i)
            .collect();

        let mut weights = WeightVector::new(covariance.as_of());
        if selected.is_empty() {
            return Ok(weights);
        }

        let n = selected.len();
        let mut sigma: Vec<Vec<f64>> = selected
            .iter()
            .map(|&i| selected.iter().map(|&j| covariance.get(i, j)).collect())
            .collect();
        let mut mu: Vec<f64> = selected
            .iter()
            .map(|&i| scores[&covariance.assets()[i]])
            .collect();

        solve_in_place(&mut sigma, &mut mu, n)?;

        // Long-only: clip shorts, then normalize.
        let mut raw: Vec<f64> = mu.iter().map(|w| w.max(0.0)).collect();
        let total: f64 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(AllocateError::NotConverged { iterations: 1 });
        }
        for w in &mut raw {
            *w /= total;
        }

        for (slot, &sel) in selected.iter().enumerate() {
            weights.set(covariance.assets()[sel].clone(), raw[slot]);
        }
        Ok(weights)
    }
}

/// Gauss–Jordan elimination with partial pivoting, solving Σx = μ in place
/// (the solution lands in `mu`).
fn solve_in_place(sigma: &mut [Vec<f64>], mu: &mut [f64], n: usize) -> Result<(), AllocateError> {
    let scale = (0..n)
        .map(|i| sigma[i][i].abs())
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);

    for col in 0..n {
        // Partial pivot: largest magnitude in this column.
        let pivot_row = (col..n)
            .max_by(|&a, &b| {
                sigma[a][col]
                    .abs()
                    .partial_cmp(&sigma[b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if sigma[pivot_row][col].abs() < PIVOT_RATIO * scale {
            return Err(AllocateError::SingularCovariance { dimension: n });
        }
        sigma.swap(col, pivot_row);
        mu.swap(col, pivot_row);

        let pivot = sigma[col][col];
        for value in sigma[col].iter_mut() {
            *value /= pivot;
        }
        mu[col] /= pivot;

        let pivot_row = sigma[col].clone();
        let pivot_mu = mu[col];
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = sigma[row][col];
            if factor == 0.0 {
                continue;
            }
            for (k, &pivot_value) in pivot_row.iter().enumerate() {
                sigma[row][k] -= factor * pivot_value;
            }
            mu[row] -= factor * pivot_mu;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn scores(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(id, s)| (id.to_string(), *s)).collect()
    }

    fn floor() -> Constraints {
        Constraints {
            score_floor: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_diagonal_covariance_prefers_high_score_low_var() {
        let cov = CovarianceMatrix::from_parts(
            date(),
            vec!["A".to_string(), "B".to_string()],
            vec![vec![0.04, 0.0], vec![0.0, 0.01]],
        )
        .unwrap();
        let allocator = MeanVarianceAllocator;
        let weights = allocator
            .optimize(&scores(&[("A", 0.5), ("B", 0.5)]), &cov, &floor())
            .unwrap();

        // Equal scores: weights go as 1/variance.
        assert!(weights.get("B") > weights.get("A"));
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_covariance_errors() {
        // Two perfectly correlated assets: rank-one matrix.
        let cov = CovarianceMatrix::from_parts(
            date(),
            vec!["A".to_string(), "B".to_string()],
            vec![vec![0.04, 0.04], vec![0.04, 0.04]],
        )
        .unwrap();
        let allocator = MeanVarianceAllocator;
        let result = allocator.optimize(&scores(&[("A", 0.5), ("B", 0.4)]), &cov, &floor());
        assert!(matches!(
            result,
            Err(AllocateError::SingularCovariance { dimension: 2 })
        ));
    }

    #[test]
    fn test_long_only_output() {
        let cov = CovarianceMatrix::from_parts(
            date(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![
                vec![0.040, 0.020, 0.001],
                vec![0.020, 0.030, 0.002],
                vec![0.001, 0.002, 0.020],
            ],
        )
        .unwrap();
        let allocator = MeanVarianceAllocator;
        let weights = allocator
            .optimize(&scores(&[("A", 0.8), ("B", 0.1), ("C", 0.4)]), &cov, &floor())
            .unwrap();
        assert!(weights.validate_long_only().is_ok());
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }
}
