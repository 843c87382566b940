//! Daily OHLCV bars and per-asset history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// A single daily OHLCV bar.
///
/// Immutable once ingested. The price-sanity invariants are checked at
/// ingestion time by [`PriceHistory::push`]; a bar that fails them is a
/// supplier contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading session date
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
}

impl PriceBar {
    /// Create a new bar.
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the price-sanity invariants.
    ///
    /// Returns the first violated invariant as a human-readable reason.
    pub fn sanity_check(&self) -> Result<(), String> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} price {value} is not a positive finite number"));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("volume {} is negative or not finite", self.volume));
        }
        if self.high < self.open.max(self.close).max(self.low) {
            return Err(format!("high {} below max(open, close, low)", self.high));
        }
        if self.low > self.open.min(self.close).min(self.high) {
            return Err(format!("low {} above min(open, close, high)", self.low));
        }
        Ok(())
    }
}

/// Date-ascending bar series for one asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    /// Asset identifier
    pub asset_id: String,
    bars: Vec<PriceBar>,
}

impl PriceHistory {
    /// Create an empty history.
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            bars: Vec::new(),
        }
    }

    /// Build a history from bars, validating each one.
    ///
    /// Bars must already be strictly date-ascending.
    pub fn from_bars(
        asset_id: impl Into<String>,
        bars: impl IntoIterator<Item = PriceBar>,
    ) -> Result<Self, DataError> {
        let mut history = Self::new(asset_id);
        for bar in bars {
            history.push(bar)?;
        }
        Ok(history)
    }

    /// Append a bar, enforcing sanity invariants and strict date ordering.
    pub fn push(&mut self, bar: PriceBar) -> Result<(), DataError> {
        bar.sanity_check().map_err(|reason| DataError::MalformedBar {
            asset_id: self.asset_id.clone(),
            date: bar.date,
            reason,
        })?;
        if let Some(last) = self.bars.last() {
            if bar.date <= last.date {
                return Err(DataError::OutOfOrder {
                    asset_id: self.asset_id.clone(),
                    date: bar.date,
                });
            }
        }
        self.bars.push(bar);
        Ok(())
    }

    /// Number of bars.
    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Check if the history is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All bars, date ascending.
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// First session date, if any.
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    /// Last session date, if any.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Bars dated on or before `date`.
    pub fn up_to(&self, date: NaiveDate) -> &[PriceBar] {
        let end = self.bars.partition_point(|b| b.date <= date);
        &self.bars[..end]
    }

    /// The bar for an exact session date, if one exists.
    pub fn bar_on(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.bars
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| &self.bars[i])
    }
}
