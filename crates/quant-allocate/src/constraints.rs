//! Weight constraints and post-optimization projection.

use std::collections::BTreeMap;

use quant_core::{AllocateError, Degradation, DegradationKind, WeightVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bounded passes of clip-and-renormalize before giving up.
const MAX_PROJECTION_PASSES: usize = 16;

/// Allocation constraints.
///
/// None of the allocation methods has native constraint support, so these
/// are applied as a projection (clip and renormalize) after the method
/// runs. The projected vector is an approximation of the constrained
/// optimum, not an exact re-solve — callers are told via the degradation
/// flag when even the projection could not satisfy the bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Eligibility floor on the composite score; assets at or below it are
    /// not allocated.
    pub score_floor: f64,
    /// Minimum weight for a held position; smaller allocations are dropped
    /// to zero rather than held as dust.
    pub min_weight: f64,
    /// Maximum weight per asset
    pub max_weight: f64,
    /// Maximum total weight per sector, if sector data is supplied
    pub max_sector_weight: Option<f64>,
    /// Asset to sector mapping; assets without an entry are unconstrained
    /// by sector caps.
    pub sector_map: BTreeMap<String, String>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            score_floor: 0.0,
            min_weight: 0.01,
            max_weight: 0.25,
            max_sector_weight: Some(0.40),
            sector_map: BTreeMap::new(),
        }
    }
}

impl Constraints {
    /// Validate the bound structure itself.
    pub fn validate(&self) -> Result<(), AllocateError> {
        if self.min_weight < 0.0 || self.max_weight <= 0.0 || self.max_weight > 1.0 {
            return Err(AllocateError::Infeasible(format!(
                "weight bounds [{}, {}] are not a valid range",
                self.min_weight, self.max_weight
            )));
        }
        if self.min_weight > self.max_weight {
            return Err(AllocateError::Infeasible(format!(
                "min weight {} exceeds max weight {}",
                self.min_weight, self.max_weight
            )));
        }
        if let Some(cap) = self.max_sector_weight {
            if cap <= 0.0 || cap > 1.0 {
                return Err(AllocateError::Infeasible(format!(
                    "sector cap {cap} is not in (0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Project a raw weight vector onto the constraint set.
    ///
    /// Per-asset caps and sector caps are enforced exactly; the weight sum
    /// is preserved where possible and otherwise shrinks (the remainder is
    /// held as cash). Returns a degradation event when the bounds could not
    /// be settled within the pass budget.
    pub fn project(
        &self,
        raw: &WeightVector,
    ) -> Result<(WeightVector, Option<Degradation>), AllocateError> {
        self.validate()?;

        let target_sum = raw.sum().min(1.0);
        let mut weights: BTreeMap<String, f64> = raw
            .iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(id, w)| (id.to_string(), w))
            .collect();

        for _ in 0..MAX_PROJECTION_PASSES {
            // Drop dust positions, cap the rest.
            weights.retain(|_, w| *w >= self.min_weight);
            for w in weights.values_mut() {
                *w = w.min(self.max_weight);
            }
            self.cap_sectors(&mut weights);

            let sum: f64 = weights.values().sum();
            if sum <= 0.0 {
                break;
            }

            // Renormalize uncapped names toward the target sum. Capped
            // names cannot absorb more, so scale only the headroom.
            let capped_sum: f64 = weights
                .values()
                .filter(|w| **w >= self.max_weight)
                .sum();
            let free_sum = sum - capped_sum;
            let free_target = (target_sum - capped_sum).max(0.0);
            if free_sum <= 0.0 {
                break;
            }
            let scale = free_target / free_sum;
            if (scale - 1.0).abs() < 1e-9 {
                break;
            }
            for w in weights.values_mut() {
                if *w < self.max_weight {
                    *w *= scale;
                }
            }
        }

        // A final clip so the bounds hold even when the pass budget ran
        // out mid-renormalization.
        weights.retain(|_, w| *w >= self.min_weight);
        for w in weights.values_mut() {
            *w = w.min(self.max_weight);
        }
        self.cap_sectors(&mut weights);

        let projected = WeightVector::from_weights(raw.date(), weights);
        projected.validate_long_only()?;

        let shortfall = target_sum - projected.sum();
        let degradation = if shortfall > 1e-6 {
            let detail = format!(
                "projection settled at {:.4} of target {:.4} exposure",
                projected.sum(),
                target_sum
            );
            warn!(date = %raw.date(), %detail, "constraint projection is best-effort");
            Some(Degradation::new(
                raw.date(),
                DegradationKind::ConstraintInfeasible,
                detail,
            ))
        } else {
            None
        };

        Ok((projected, degradation))
    }

    /// Scale down any sector exceeding its cap. Freed exposure is left as
    /// cash; the renormalize pass may re-spread it across other sectors.
    fn cap_sectors(&self, weights: &mut BTreeMap<String, f64>) {
        let Some(cap) = self.max_sector_weight else {
            return;
        };
        if self.sector_map.is_empty() {
            return;
        }

        let mut sector_sums: BTreeMap<&str, f64> = BTreeMap::new();
        for (asset, w) in weights.iter() {
            if let Some(sector) = self.sector_map.get(asset) {
                *sector_sums.entry(sector.as_str()).or_default() += *w;
            }
        }
        for (sector, sum) in sector_sums {
            if sum > cap {
                let scale = cap / sum;
                for (asset, w) in weights.iter_mut() {
                    if self.sector_map.get(asset).map(String::as_str) == Some(sector) {
                        *w *= scale;
                    }
                }
            }
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

    fn raw(pairs: &[(&str, f64)]) -> WeightVector {
        let mut v = WeightVector::new(date());
        for (id, w) in pairs {
            v.set(*id, *w);
        }
        v
    }

    #[test]
    fn test_caps_are_enforced() {
        let constraints = Constraints::default();
        let (projected, _) = constraints
            .project(&raw(&[("A", 0.60), ("B", 0.25), ("C", 0.15)]))
            .unwrap();
        assert!(projected.get("A") <= constraints.max_weight + 1e-9);
        assert!(projected.validate_long_only().is_ok());
    }

    #[test]
    fn test_dust_positions_dropped() {
        let constraints = Constraints::default();
        let (projected, _) = constraints
            .project(&raw(&[("A", 0.995), ("B", 0.005)]))
            .unwrap();
        assert_eq!(projected.get("B"), 0.0);
    }

    #[test]
    fn test_sector_cap_scales_sector() {
        let mut constraints = Constraints::default();
        constraints.max_weight = 0.5;
        constraints.sector_map = [
            ("A".to_string(), "tech".to_string()),
            ("B".to_string(), "tech".to_string()),
            ("C".to_string(), "energy".to_string()),
        ]
        .into_iter()
        .collect();

        let (projected, _) = constraints
            .project(&raw(&[("A", 0.4), ("B", 0.4), ("C", 0.2)]))
            .unwrap();
        let tech = projected.get("A") + projected.get("B");
        assert!(tech <= 0.40 + 1e-6, "tech sector at {tech}");
    }

    #[test]
    fn test_infeasible_bounds_rejected() {
        let constraints = Constraints {
            min_weight: 0.5,
            max_weight: 0.25,
            ..Default::default()
        };
        assert!(constraints.project(&raw(&[("A", 1.0)])).is_err());
    }

    #[test]
    fn test_tight_caps_leave_cash_and_flag() {
        // Two assets, 25% cap each: a fully-invested target cannot be met.
        let constraints = Constraints::default();
        let (projected, degradation) = constraints
            .project(&raw(&[("A", 0.5), ("B", 0.5)]))
            .unwrap();
        assert!(projected.sum() <= 0.5 + 1e-9);
        assert!(degradation.is_some());
    }

    #[test]
    fn test_within_bounds_passes_through() {
        let constraints = Constraints::default();
        let (projected, degradation) = constraints
            .project(&raw(&[("A", 0.2), ("B", 0.2), ("C", 0.2)]))
            .unwrap();
        assert!((projected.sum() - 0.6).abs() < 1e-9);
        assert!(degradation.is_none());
    }
}
