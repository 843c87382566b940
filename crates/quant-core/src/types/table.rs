//! Multi-asset price table and point-in-time views.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, LookaheadViolation};
use crate::types::bar::{PriceBar, PriceHistory};

/// Price histories for a universe of assets, keyed by asset id.
///
/// A `BTreeMap` keeps iteration order deterministic (asset_id ascending),
/// which every downstream merge relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceTable {
    histories: BTreeMap<String, PriceHistory>,
}

impl PriceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a history, replacing any existing one for the same asset.
    pub fn insert(&mut self, history: PriceHistory) {
        self.histories.insert(history.asset_id.clone(), history);
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Check if the table has no assets.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Asset ids in ascending order.
    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.histories.keys().map(String::as_str)
    }

    /// History for one asset.
    pub fn history(&self, asset_id: &str) -> Result<&PriceHistory, DataError> {
        self.histories
            .get(asset_id)
            .ok_or_else(|| DataError::AssetNotFound(asset_id.to_string()))
    }

    /// All rebalance-eligible session dates across the whole table,
    /// ascending and de-duplicated.
    pub fn session_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .histories
            .values()
            .flat_map(|h| h.bars().iter().map(|b| b.date))
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }

    /// Create a point-in-time view bounded by `clock`.
    ///
    /// Every downstream stage receives this view rather than the table, so
    /// data beyond the simulation clock is unreachable by construction and
    /// explicit date requests beyond it fail with [`LookaheadViolation`].
    pub fn visible_through(&self, clock: NaiveDate) -> PriceView<'_> {
        PriceView { table: self, clock }
    }
}

impl FromIterator<PriceHistory> for PriceTable {
    fn from_iter<T: IntoIterator<Item = PriceHistory>>(iter: T) -> Self {
        let mut table = Self::new();
        for history in iter {
            table.insert(history);
        }
        table
    }
}

/// Point-in-time window over a [`PriceTable`].
///
/// All bar access is clipped to dates `<=` the view's clock. Requests that
/// name a later date are a contract violation and return
/// [`LookaheadViolation`].
#[derive(Debug, Clone, Copy)]
pub struct PriceView<'a> {
    table: &'a PriceTable,
    clock: NaiveDate,
}

impl<'a> PriceView<'a> {
    /// The simulation clock bounding this view.
    pub fn clock(&self) -> NaiveDate {
        self.clock
    }

    /// Asset ids in ascending order.
    pub fn asset_ids(&self) -> impl Iterator<Item = &'a str> {
        self.table.asset_ids()
    }

    /// Bars for `asset_id` dated on or before the clock.
    pub fn bars(&self, asset_id: &str) -> Result<&'a [PriceBar], DataError> {
        Ok(self.table.history(asset_id)?.up_to(self.clock))
    }

    /// The last `len` closes for `asset_id`, oldest first.
    ///
    /// Returns fewer than `len` values when the visible history is shorter;
    /// callers enforce their own minimum-history policy.
    pub fn closes(&self, asset_id: &str, len: usize) -> Result<Vec<f64>, DataError> {
        let bars = self.bars(asset_id)?;
        let start = bars.len().saturating_sub(len);
        Ok(bars[start..].iter().map(|b| b.close).collect())
    }

    /// The bar on an exact session date.
    ///
    /// Fails with [`LookaheadViolation`] if `date` is beyond the clock.
    pub fn bar_on(
        &self,
        asset_id: &str,
        date: NaiveDate,
    ) -> Result<Option<&'a PriceBar>, LookaheadViolation> {
        self.guard(date)?;
        Ok(self
            .table
            .histories
            .get(asset_id)
            .and_then(|h| h.bar_on(date)))
    }

    /// Whether `asset_id` was actually tradeable on `date`.
    ///
    /// An asset is eligible only when it has a bar dated exactly `date`:
    /// the universe per date reflects what existed then, not today's
    /// membership.
    pub fn is_tradeable(
        &self,
        asset_id: &str,
        date: NaiveDate,
    ) -> Result<bool, LookaheadViolation> {
        Ok(self.bar_on(asset_id, date)?.is_some())
    }

    /// Union session dates visible in this view, ascending.
    ///
    /// Used to detect gaps in a single asset's history: a bar missing on a
    /// date where the rest of the universe traded.
    pub fn sessions(&self) -> Vec<NaiveDate> {
        self.table
            .session_dates()
            .into_iter()
            .filter(|d| *d <= self.clock)
            .collect()
    }

    /// Assets tradeable on the clock date, ascending.
    pub fn tradeable_assets(&self) -> Vec<&'a str> {
        self.table
            .histories
            .iter()
            .filter(|(_, h)| h.bar_on(self.clock).is_some())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    fn guard(&self, requested: NaiveDate) -> Result<(), LookaheadViolation> {
        if requested > self.clock {
            return Err(LookaheadViolation {
                requested,
                clock: self.clock,
            });
        }
        Ok(())
    }
}
