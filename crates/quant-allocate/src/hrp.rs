//! Hierarchical risk allocation.
//!
//! Clusters assets by correlation distance, orders them quasi-diagonally
//! and splits capital down the cluster tree inversely to cluster variance.
//! Needs no matrix inversion, which is what makes it robust to covariance
//! estimation error — it is the pipeline's default and fallback method.

use std::collections::BTreeMap;

use quant_core::{AllocateError, WeightVector};

use crate::constraints::Constraints;
use crate::covariance::CovarianceMatrix;
use crate::Allocator;

/// Hierarchical risk allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HrpAllocator;

impl Allocator for HrpAllocator {
    fn name(&self) -> &'static str {
        "hrp"
    }

    fn optimize(
        &self,
        scores: &BTreeMap<String, f64>,
        covariance: &CovarianceMatrix,
        constraints: &Constraints,
    ) -> Result<WeightVector, AllocateError> {
        // Scores select the sleeve; risk structure sets the weights.
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
        if selected.len() == 1 {
            weights.set(covariance.assets()[selected[0]].clone(), 1.0);
            return Ok(weights);
        }

        let order = quasi_diagonal_order(covariance, &selected);
        let mut allocation = vec![0.0; selected.len()];
        bisect(covariance, &selected, &order, 1.0, &mut allocation);

        for (slot, &sel) in selected.iter().enumerate() {
            weights.set(covariance.assets()[sel].clone(), allocation[slot]);
        }
        Ok(weights)
    }
}

/// Leaf order after single-linkage clustering on correlation distance.
///
/// Tie-breaks are fixed: candidate pairs are scanned in ascending
/// (cluster, cluster) order and only a strictly smaller distance replaces
/// the incumbent, so equal distances resolve to the lowest asset indices.
fn quasi_diagonal_order(covariance: &CovarianceMatrix, selected: &[usize]) -> Vec<usize> {
    let n = selected.len();
    let corr = covariance.correlation();

    // Correlation distance between selected assets.
    let dist = |a: usize, b: usize| -> f64 {
        (0.5 * (1.0 - corr[selected[a]][selected[b]])).max(0.0).sqrt()
    };

    // Active clusters hold slot indices into `selected`, in leaf order.
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    // Single linkage: cluster distance is the minimum pairwise distance.
    let cluster_dist = |x: &[usize], y: &[usize]| -> f64 {
        let mut best = f64::INFINITY;
        for &a in x {
            for &b in y {
                let d = dist(a, b);
                if d < best {
                    best = d;
                }
            }
        }
        best
    };

    while clusters.len() > 1 {
        let mut best = (0, 1);
        let mut best_dist = f64::INFINITY;
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let d = cluster_dist(&clusters[i], &clusters[j]);
                if d < best_dist {
                    best_dist = d;
                    best = (i, j);
                }
            }
        }
        let merged_right = clusters.remove(best.1);
        clusters[best.0].extend(merged_right);
    }

    clusters.pop().unwrap_or_default()
}

/// Inverse-variance weights within one cluster, and the resulting cluster
/// variance.
fn cluster_variance(covariance: &CovarianceMatrix, selected: &[usize], slots: &[usize]) -> f64 {
    let indices: Vec<usize> = slots.iter().map(|&s| selected[s]).collect();
    let inv_var: Vec<f64> = indices
        .iter()
        .map(|&i| {
            let v = covariance.variance(i);
            if v > 0.0 {
                1.0 / v
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = inv_var.iter().sum();
    if total <= 0.0 {
        // Degenerate cluster (all zero variance): treat as equal weight.
        let w = 1.0 / indices.len() as f64;
        let weights = vec![w; indices.len()];
        return covariance.portfolio_variance(&indices, &weights);
    }
    let weights: Vec<f64> = inv_var.iter().map(|v| v / total).collect();
    covariance.portfolio_variance(&indices, &weights)
}

/// Recursive bisection of the ordered leaves.
fn bisect(
    covariance: &CovarianceMatrix,
    selected: &[usize],
    order: &[usize],
    multiplier: f64,
    allocation: &mut [f64],
) {
    if order.len() == 1 {
        allocation[order[0]] += multiplier;
        return;
    }
    let (left, right) = order.split_at(order.len() / 2);
    let var_left = cluster_variance(covariance, selected, left);
    let var_right = cluster_variance(covariance, selected, right);
    let total = var_left + var_right;
    // Allocate inversely to cluster variance at this split.
    let alpha = if total > 0.0 {
        1.0 - var_left / total
    } else {
        0.5
    };
    bisect(covariance, selected, left, multiplier * alpha, allocation);
    bisect(covariance, selected, right, multiplier * (1.0 - alpha), allocation);
}
