//! Portfolio allocation for the strategy pipeline.
//!
//! Three allocation methods sit behind one [`Allocator`] seam, selected by
//! configuration through the [`AllocationMethod`] tag — never by runtime
//! type inspection. Hierarchical risk allocation is the documented default
//! and the fallback when a non-default method fails numerically; the
//! fallback is recorded as a degradation event, not raised.

pub mod constraints;
pub mod covariance;
pub mod hrp;
pub mod mean_variance;
pub mod risk_parity;

use std::collections::BTreeMap;

use quant_core::{AllocateError, Degradation, DegradationKind, WeightVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use constraints::Constraints;
pub use covariance::CovarianceMatrix;
pub use hrp::HrpAllocator;
pub use mean_variance::MeanVarianceAllocator;
pub use risk_parity::RiskParityAllocator;

/// The single capability every allocation method implements.
pub trait Allocator {
    /// Method name for logs and reports.
    fn name(&self) -> &'static str;

    /// Turn scores and a covariance estimate into a weight vector.
    ///
    /// The result is raw: constraint projection happens afterwards, since
    /// none of the methods supports the bounds natively. Identical inputs
    /// must produce value-identical output.
    fn optimize(
        &self,
        scores: &BTreeMap<String, f64>,
        covariance: &CovarianceMatrix,
        constraints: &Constraints,
    ) -> Result<WeightVector, AllocateError>;
}

/// Which allocation method a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// Hierarchical risk allocation (default)
    #[default]
    Hrp,
    /// Mean-variance, scores as expected returns
    MeanVariance,
    /// Equal risk contribution
    RiskParity,
}

impl AllocationMethod {
    /// Stable name for logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMethod::Hrp => "hrp",
            AllocationMethod::MeanVariance => "mean_variance",
            AllocationMethod::RiskParity => "risk_parity",
        }
    }
}

/// Allocation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocateConfig {
    /// Selected method
    pub method: AllocationMethod,
    /// Trailing sessions for covariance estimation
    pub cov_window: usize,
    /// Risk-parity iteration cap
    pub risk_parity_max_iter: usize,
    /// Risk-parity convergence tolerance
    pub risk_parity_tolerance: f64,
    /// Weight and sector constraints
    pub constraints: Constraints,
}

impl Default for AllocateConfig {
    fn default() -> Self {
        Self {
            method: AllocationMethod::Hrp,
            cov_window: 126,
            risk_parity_max_iter: 200,
            risk_parity_tolerance: 1e-8,
            constraints: Constraints::default(),
        }
    }
}

impl AllocateConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), AllocateError> {
        if self.cov_window < 2 {
            return Err(AllocateError::InvalidInput(
                "cov_window must be at least 2".to_string(),
            ));
        }
        if self.risk_parity_max_iter == 0 {
            return Err(AllocateError::InvalidInput(
                "risk_parity_max_iter must be positive".to_string(),
            ));
        }
        self.constraints.validate()
    }
}

/// Result of one allocation: the constrained weights plus any degradation
/// events recorded along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOutcome {
    pub weights: WeightVector,
    pub degradations: Vec<Degradation>,
}

/// Run the configured method with fallback and constraint projection.
///
/// The configured method runs first; if it fails numerically, HRP takes
/// over and the event is recorded as `OptimizationDegraded`. HRP itself
/// cannot fail on a valid covariance, so an error from the fallback is a
/// genuine input problem and propagates.
pub fn run_allocation(
    config: &AllocateConfig,
    scores: &BTreeMap<String, f64>,
    covariance: &CovarianceMatrix,
) -> Result<AllocationOutcome, AllocateError> {
    config.validate()?;
    let mut degradations = Vec::new();

    let raw = match dispatch(config, scores, covariance) {
        Ok(weights) => weights,
        Err(err) if config.method != AllocationMethod::Hrp => {
            warn!(
                method = config.method.as_str(),
                error = %err,
                "allocation method failed; falling back to hrp"
            );
            degradations.push(Degradation::new(
                covariance.as_of(),
                DegradationKind::OptimizationDegraded,
                format!("{} failed ({err}); used hrp", config.method.as_str()),
            ));
            HrpAllocator.optimize(scores, covariance, &config.constraints)?
        }
        Err(err) => return Err(err),
    };

    let (weights, projection_flag) = config.constraints.project(&raw)?;
    degradations.extend(projection_flag);

    Ok(AllocationOutcome {
        weights,
        degradations,
    })
}

fn dispatch(
    config: &AllocateConfig,
    scores: &BTreeMap<String, f64>,
    covariance: &CovarianceMatrix,
) -> Result<WeightVector, AllocateError> {
    match config.method {
        AllocationMethod::Hrp => HrpAllocator.optimize(scores, covariance, &config.constraints),
        AllocationMethod::MeanVariance => {
            MeanVarianceAllocator.optimize(scores, covariance, &config.constraints)
        }
        AllocationMethod::RiskParity => {
            RiskParityAllocator::new(config.risk_parity_max_iter, config.risk_parity_tolerance)
                .optimize(scores, covariance, &config.constraints)
        }
    }
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

    fn degenerate_cov() -> CovarianceMatrix {
        // Two perfectly correlated assets.
        CovarianceMatrix::from_parts(
            date(),
            vec!["A".to_string(), "B".to_string()],
            vec![vec![0.04, 0.04], vec![0.04, 0.04]],
        )
        .unwrap()
    }

    #[test]
    fn test_mean_variance_falls_back_to_hrp_on_degenerate_covariance() {
        let config = AllocateConfig {
            method: AllocationMethod::MeanVariance,
            ..Default::default()
        };
        let outcome =
            run_allocation(&config, &scores(&[("A", 0.5), ("B", 0.4)]), &degenerate_cov())
                .unwrap();

        assert_eq!(outcome.degradations.len(), 1);
        assert_eq!(
            outcome.degradations[0].kind,
            DegradationKind::OptimizationDegraded
        );
        assert!(outcome.weights.validate_long_only().is_ok());
    }

    #[test]
    fn test_hrp_default_does_not_degrade() {
        let config = AllocateConfig::default();
        let outcome =
            run_allocation(&config, &scores(&[("A", 0.5), ("B", 0.4)]), &degenerate_cov())
                .unwrap();
        assert!(outcome
            .degradations
            .iter()
            .all(|d| d.kind != DegradationKind::OptimizationDegraded));
    }

    #[test]
    fn test_projection_applied_after_method() {
        let config = AllocateConfig::default();
        let outcome =
            run_allocation(&config, &scores(&[("A", 0.5), ("B", 0.4)]), &degenerate_cov())
                .unwrap();
        // Default max weight is 0.25 per asset.
        for (_, w) in outcome.weights.iter() {
            assert!(w <= 0.25 + 1e-9);
        }
    }

    #[test]
    fn test_deterministic_end_to_end() {
        let config = AllocateConfig {
            method: AllocationMethod::RiskParity,
            ..Default::default()
        };
        let cov = CovarianceMatrix::from_parts(
            date(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![
                vec![0.040, 0.010, 0.002],
                vec![0.010, 0.020, 0.004],
                vec![0.002, 0.004, 0.015],
            ],
        )
        .unwrap();
        let s = scores(&[("A", 0.5), ("B", 0.5), ("C", 0.5)]);

        let first = run_allocation(&config, &s, &cov).unwrap();
        let second = run_allocation(&config, &s, &cov).unwrap();
        assert_eq!(first.weights, second.weights);
    }
}
