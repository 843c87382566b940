//! The meta-filter: a frozen secondary classifier over candidate trades.
//!
//! Training and calibration happen offline on historical outcomes; the
//! pipeline only loads a versioned artifact and runs inference. The filter
//! sits in front of the cost gate — it is cheaper and higher-precision, so
//! it prunes candidates before costs are even estimated.

use std::path::Path;

use quant_core::PipelineError;
use serde::{Deserialize, Serialize};

use crate::features::TradeFeatures;

/// A frozen, versioned logistic model with its feature scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Artifact version, recorded in reports
    pub version: String,
    /// Feature names in scaler/coefficient order
    pub features: Vec<String>,
    /// Per-feature standardization means
    pub means: Vec<f64>,
    /// Per-feature standardization deviations
    pub stds: Vec<f64>,
    /// Logistic coefficients
    pub coefficients: Vec<f64>,
    /// Logistic intercept
    pub intercept: f64,
    /// Probability below which an intent is suppressed
    pub threshold: f64,
}

impl ModelArtifact {
    /// Load an artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate an artifact from JSON.
    pub fn from_json(raw: &str) -> Result<Self, PipelineError> {
        let artifact: Self = serde_json::from_str(raw)
            .map_err(|e| PipelineError::ModelArtifact(format!("parse failure: {e}")))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Validate internal consistency against the canonical feature set.
    ///
    /// A mismatched artifact is a loading error, never a silent skip: an
    /// old model scoring new features would be wrong quietly.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let n = self.features.len();
        if self.means.len() != n || self.stds.len() != n || self.coefficients.len() != n {
            return Err(PipelineError::ModelArtifact(format!(
                "artifact {} has inconsistent shapes: {} features, {} means, {} stds, {} coefficients",
                self.version,
                n,
                self.means.len(),
                self.stds.len(),
                self.coefficients.len()
            )));
        }
        if self.features != TradeFeatures::NAMES {
            return Err(PipelineError::ModelArtifact(format!(
                "artifact {} feature set {:?} does not match the pipeline's {:?}",
                self.version,
                self.features,
                TradeFeatures::NAMES
            )));
        }
        if self.stds.iter().any(|s| *s <= 0.0 || !s.is_finite()) {
            return Err(PipelineError::ModelArtifact(format!(
                "artifact {} has non-positive feature deviations",
                self.version
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PipelineError::ModelArtifact(format!(
                "artifact {} threshold {} is outside [0, 1]",
                self.version, self.threshold
            )));
        }
        Ok(())
    }
}

/// Inference wrapper around a validated artifact.
pub struct MetaFilter {
    artifact: ModelArtifact,
}

impl MetaFilter {
    /// Wrap a validated artifact.
    pub fn new(artifact: ModelArtifact) -> Result<Self, PipelineError> {
        artifact.validate()?;
        Ok(Self { artifact })
    }

    /// The artifact version, for reports.
    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    /// The suppression threshold.
    pub fn threshold(&self) -> f64 {
        self.artifact.threshold
    }

    /// P(profitable | features): standardize, dot, sigmoid.
    pub fn probability(&self, features: &TradeFeatures) -> f64 {
        let vector = features.vector();
        let z = vector
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let standardized = (x - self.artifact.means[i]) / self.artifact.stds[i];
                self.artifact.coefficients[i] * standardized
            })
            .sum::<f64>()
            + self.artifact.intercept;
        1.0 / (1.0 + (-z).exp())
    }

    /// Whether an intent with these features survives the filter.
    pub fn approves(&self, features: &TradeFeatures) -> bool {
        self.probability(features) >= self.artifact.threshold
    }
}
