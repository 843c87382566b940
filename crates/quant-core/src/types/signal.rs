//! Signal rows and per-date signal tables.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of signal carried by a [`SignalRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Trailing return vs the risk-free benchmark
    AbsoluteMomentum,
    /// Cross-sectional rank of trailing return, ties averaged
    RelativeMomentum,
    /// Normalized RSI/MACD blend
    TechnicalComposite,
    /// Weighted blend of the sub-signals
    Composite,
}

impl SignalKind {
    /// Stable display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::AbsoluteMomentum => "absolute_momentum",
            SignalKind::RelativeMomentum => "relative_momentum",
            SignalKind::TechnicalComposite => "technical_composite",
            SignalKind::Composite => "composite",
        }
    }
}

/// One asset's value for one signal on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub asset_id: String,
    pub date: NaiveDate,
    pub signal: SignalKind,
    pub value: f64,
}

/// All signal rows for a single rebalance date.
///
/// Rows are kept sorted by (asset_id, signal) so the table is reproducible
/// regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTable {
    date: NaiveDate,
    rows: Vec<SignalRow>,
}

impl SignalTable {
    /// Create an empty table for a date.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            rows: Vec::new(),
        }
    }

    /// The rebalance date this table belongs to.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Insert a row, keeping sort order by (asset_id, signal).
    ///
    /// A row for the same key replaces the previous value.
    pub fn insert(&mut self, row: SignalRow) {
        debug_assert_eq!(row.date, self.date);
        let key = (row.asset_id.clone(), row.signal);
        match self
            .rows
            .binary_search_by(|r| (r.asset_id.clone(), r.signal).cmp(&key))
        {
            Ok(i) => self.rows[i] = row,
            Err(i) => self.rows.insert(i, row),
        }
    }

    /// All rows, sorted by (asset_id, signal).
    pub fn rows(&self) -> &[SignalRow] {
        &self.rows
    }

    /// Value for an asset/signal pair.
    pub fn value(&self, asset_id: &str, signal: SignalKind) -> Option<f64> {
        self.rows
            .binary_search_by(|r| (r.asset_id.as_str(), r.signal).cmp(&(asset_id, signal)))
            .ok()
            .map(|i| self.rows[i].value)
    }

    /// Distinct asset ids present in the table, ascending.
    pub fn asset_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.rows.iter().map(|r| r.asset_id.as_str()).collect();
        ids.dedup();
        ids
    }

    /// Composite scores keyed by asset, for handoff to the optimizer.
    pub fn composite_scores(&self) -> BTreeMap<String, f64> {
        self.rows
            .iter()
            .filter(|r| r.signal == SignalKind::Composite)
            .map(|r| (r.asset_id.clone(), r.value))
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn row(asset: &str, signal: SignalKind, value: f64) -> SignalRow {
        SignalRow {
            asset_id: asset.to_string(),
            date: date(),
            signal,
            value,
        }
    }

    #[test]
    fn test_insert_keeps_sorted_order() {
        let mut table = SignalTable::new(date());
        table.insert(row("MSFT", SignalKind::Composite, 0.4));
        table.insert(row("AAPL", SignalKind::Composite, 0.7));
        table.insert(row("AAPL", SignalKind::AbsoluteMomentum, 0.1));

        let keys: Vec<(&str, SignalKind)> = table
            .rows()
            .iter()
            .map(|r| (r.asset_id.as_str(), r.signal))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("AAPL", SignalKind::AbsoluteMomentum),
                ("AAPL", SignalKind::Composite),
                ("MSFT", SignalKind::Composite),
            ]
        );
    }

    #[test]
    fn test_insert_replaces_same_key() {
        let mut table = SignalTable::new(date());
        table.insert(row("AAPL", SignalKind::Composite, 0.7));
        table.insert(row("AAPL", SignalKind::Composite, 0.9));

        assert_eq!(table.len(), 1);
        assert_eq!(table.value("AAPL", SignalKind::Composite), Some(0.9));
    }

    #[test]
    fn test_composite_scores_filters_kind() {
        let mut table = SignalTable::new(date());
        table.insert(row("AAPL", SignalKind::Composite, 0.7));
        table.insert(row("AAPL", SignalKind::RelativeMomentum, 0.5));
        table.insert(row("MSFT", SignalKind::Composite, 0.4));

        let scores = table.composite_scores();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["AAPL"], 0.7);
        assert_eq!(scores["MSFT"], 0.4);
    }
}
