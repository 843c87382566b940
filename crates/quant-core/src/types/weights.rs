//! Portfolio weight vectors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AllocateError;
use crate::types::trade::{TradeDirection, TradeIntent};

/// Tolerance on the long-only weight-sum invariant (Σw ≤ 1 + tolerance).
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Asset weights at a rebalance date.
///
/// Weights are stored in a `BTreeMap` so iteration, serialization and
/// diffing are deterministic. Assets absent from the map have weight zero.
/// The sum may be below 1 when cash is held back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    date: NaiveDate,
    weights: BTreeMap<String, f64>,
}

impl WeightVector {
    /// Create an empty (all-cash) vector for a date.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weights: BTreeMap::new(),
        }
    }

    /// Build from pre-computed weights.
    pub fn from_weights(date: NaiveDate, weights: BTreeMap<String, f64>) -> Self {
        Self { date, weights }
    }

    /// The rebalance date.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Set one asset's weight.
    pub fn set(&mut self, asset_id: impl Into<String>, weight: f64) {
        self.weights.insert(asset_id.into(), weight);
    }

    /// Weight for an asset; absent assets are zero.
    pub fn get(&self, asset_id: &str) -> f64 {
        self.weights.get(asset_id).copied().unwrap_or(0.0)
    }

    /// Iterate (asset_id, weight) in ascending asset order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(id, w)| (id.as_str(), *w))
    }

    /// Number of assets with an explicit weight.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Check if the vector holds no positions.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Re-date this vector without changing the weights.
    ///
    /// Used when a rebalance is suppressed and the prior allocation is
    /// carried forward to the new date.
    pub fn carried_to(&self, date: NaiveDate) -> Self {
        Self {
            date,
            weights: self.weights.clone(),
        }
    }

    /// Enforce the long-only invariants: every weight non-negative and the
    /// sum within tolerance of 1.
    pub fn validate_long_only(&self) -> Result<(), AllocateError> {
        for (asset_id, &w) in &self.weights {
            if !w.is_finite() || w < 0.0 {
                return Err(AllocateError::InvalidInput(format!(
                    "weight for {asset_id} is {w}"
                )));
            }
        }
        let sum = self.sum();
        if sum > 1.0 + WEIGHT_TOLERANCE {
            return Err(AllocateError::InvalidInput(format!(
                "weights sum to {sum}, above 1"
            )));
        }
        Ok(())
    }

    /// Trade intents required to move from `prior` to `self`.
    ///
    /// One intent per asset whose weight changes by more than the
    /// tolerance, in ascending asset order.
    pub fn diff(&self, prior: &WeightVector) -> Vec<TradeIntent> {
        let mut assets: Vec<&String> = self.weights.keys().chain(prior.weights.keys()).collect();
        assets.sort_unstable();
        assets.dedup();

        let mut intents = Vec::new();
        for asset_id in assets {
            let delta = self.get(asset_id) - prior.get(asset_id);
            if delta.abs() <= WEIGHT_TOLERANCE {
                continue;
            }
            let direction = if delta > 0.0 {
                TradeDirection::Increase
            } else {
                TradeDirection::Decrease
            };
            intents.push(TradeIntent {
                asset_id: asset_id.clone(),
                date: self.date,
                direction,
                weight_delta: delta,
            });
        }
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_absent_asset_is_zero() {
        let vector = WeightVector::new(date());
        assert_eq!(vector.get("AAPL"), 0.0);
    }

    #[test]
    fn test_validate_long_only() {
        let mut vector = WeightVector::new(date());
        vector.set("AAPL", 0.6);
        vector.set("MSFT", 0.4);
        assert!(vector.validate_long_only().is_ok());

        vector.set("NVDA", 0.2);
        assert!(vector.validate_long_only().is_err());

        let mut short = WeightVector::new(date());
        short.set("AAPL", -0.1);
        assert!(short.validate_long_only().is_err());
    }

    #[test]
    fn test_sum_below_one_is_cash() {
        let mut vector = WeightVector::new(date());
        vector.set("AAPL", 0.5);
        assert!(vector.validate_long_only().is_ok());
        assert!((vector.sum() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_diff_produces_sorted_intents() {
        let mut prior = WeightVector::new(date());
        prior.set("AAPL", 0.5);
        prior.set("MSFT", 0.5);

        let next_date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let mut next = WeightVector::new(next_date);
        next.set("AAPL", 0.3);
        next.set("NVDA", 0.6);

        let intents = next.diff(&prior);
        assert_eq!(intents.len(), 3);
        assert_eq!(intents[0].asset_id, "AAPL");
        assert_eq!(intents[0].direction, TradeDirection::Decrease);
        assert_eq!(intents[1].asset_id, "MSFT");
        assert!((intents[1].weight_delta + 0.5).abs() < 1e-12);
        assert_eq!(intents[2].asset_id, "NVDA");
        assert_eq!(intents[2].direction, TradeDirection::Increase);
    }

    #[test]
    fn test_diff_skips_unchanged() {
        let mut prior = WeightVector::new(date());
        prior.set("AAPL", 0.5);
        let next = prior.carried_to(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        assert!(next.diff(&prior).is_empty());
    }
}
