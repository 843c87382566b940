//! Equal-risk-contribution allocation.

use std::collections::BTreeMap;

use quant_core::{AllocateError, WeightVector};

use crate::constraints::Constraints;
use crate::covariance::CovarianceMatrix;
use crate::Allocator;

/// Damping exponent on the fixed-point update; full steps oscillate on
/// strongly coupled covariances.
const DAMPING: f64 = 0.5;

/// Risk-parity allocator: every held asset contributes the same share of
/// portfolio variance.
///
/// Solved by damped fixed-point iteration on risk contributions. The
/// iteration is bounded; non-convergence is reported so the caller can
/// fall back to the default method.
#[derive(Debug, Clone, Copy)]
pub struct RiskParityAllocator {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for RiskParityAllocator {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
        }
    }
}

impl RiskParityAllocator {
    /// Create with explicit iteration bounds.
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }
}

impl Allocator for RiskParityAllocator {
    fn name(&self) -> &'static str {
        "risk_parity"
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
        if selected.iter().any(|&i| covariance.variance(i) <= 0.0) {
            return Err(AllocateError::SingularCovariance { dimension: n });
        }

        let mut w = vec![1.0 / n as f64; n];
        let target = 1.0 / n as f64;

        for _ in 0..self.max_iterations {
            let marginal: Vec<f64> = (0..n)
                .map(|a| {
                    (0..n)
                        .map(|b| covariance.get(selected[a], selected[b]) * w[b])
                        .sum::<f64>()
                })
                .collect();
            let variance: f64 = (0..n).map(|a| w[a] * marginal[a]).sum();
            if variance <= 0.0 || !variance.is_finite() {
                return Err(AllocateError::SingularCovariance { dimension: n });
            }

            // Risk contribution share of each asset.
            let shares: Vec<f64> = (0..n).map(|a| w[a] * marginal[a] / variance).collect();
            let spread = shares
                .iter()
                .map(|s| (s - target).abs())
                .fold(0.0f64, f64::max);
            if spread < self.tolerance {
                for (slot, &sel) in selected.iter().enumerate() {
                    weights.set(covariance.assets()[sel].clone(), w[slot]);
                }
                return Ok(weights);
            }

            // Damped multiplicative update toward equal contributions.
            for a in 0..n {
                if shares[a] > 0.0 {
                    w[a] *= (target / shares[a]).powf(DAMPING);
                }
            }
            let total: f64 = w.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                return Err(AllocateError::NotConverged {
                    iterations: self.max_iterations,
                });
            }
            for value in &mut w {
                *value /= total;
            }
        }

        Err(AllocateError::NotConverged {
            iterations: self.max_iterations,
        })
    }
}
