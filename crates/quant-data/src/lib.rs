//! Data loading for the strategy pipeline.

mod csv_source;

pub use csv_source::{load_history, load_table};
