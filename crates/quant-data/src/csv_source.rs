//! CSV ingestion.
//!
//! The pipeline itself never touches disk; this loader runs before a
//! simulation starts and hands over a fully validated in-memory table.

use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use quant_core::{DataError, PriceBar, PriceHistory, PriceTable};
use serde::Deserialize;
use tracing::info;

/// CSV record format. Header aliases cover the usual vendor exports.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "Date", alias = "date", alias = "timestamp", alias = "Timestamp")]
    date: String,
    #[serde(alias = "Open", alias = "open")]
    open: f64,
    #[serde(alias = "High", alias = "high")]
    high: f64,
    #[serde(alias = "Low", alias = "low")]
    low: f64,
    #[serde(alias = "Close", alias = "close", alias = "Adj Close")]
    close: f64,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: f64,
}

/// Load one asset's daily history from a CSV file.
///
/// Bars are sorted by date before validation; malformed bars fail the
/// load (the supplier contract, not this loader, is at fault).
pub fn load_history(path: &Path, asset_id: &str) -> Result<PriceHistory, DataError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| DataError::Parse(e.to_string()))?;

    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let record: CsvRecord = record.map_err(|e| DataError::Parse(e.to_string()))?;
        let date = parse_date(&record.date)?;
        bars.push(PriceBar::new(
            date,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        ));
    }

    bars.sort_by_key(|b| b.date);
    PriceHistory::from_bars(asset_id, bars)
}

/// Load a table from a directory of `{SYMBOL}.csv` files.
pub fn load_table(dir: &Path, symbols: &[String]) -> Result<PriceTable, DataError> {
    let mut table = PriceTable::new();
    for symbol in symbols {
        let candidates = [
            dir.join(format!("{symbol}.csv")),
            dir.join(format!("{}.csv", symbol.to_lowercase())),
            dir.join(format!("{symbol}_daily.csv")),
        ];
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            return Err(DataError::AssetNotFound(symbol.clone()));
        };
        table.insert(load_history(path, symbol)?);
    }
    if table.is_empty() {
        return Err(DataError::EmptyTable);
    }
    info!(assets = table.len(), "loaded price table");
    Ok(table)
}

/// Parse the date formats vendors actually emit.
fn parse_date(raw: &str) -> Result<NaiveDate, DataError> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date);
        }
    }
    // Datetime exports: take the date part.
    if let Some((date_part, _)) = raw.split_once(' ') {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            return Ok(date);
        }
    }
    Err(DataError::Parse(format!("could not parse date: {raw}")))
}
