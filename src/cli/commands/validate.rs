//! Validate-config command.

use anyhow::{Context, Result};
use quant_config::load_config;
use std::path::Path;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate().context("configuration is invalid")?;

    println!("Configuration OK");
    println!("  method:            {}", config.allocation.method.as_str());
    println!("  gate mode:         {:?}", config.gate.mode);
    println!("  rebalance every:   {} sessions", config.backtest.rebalance_every);
    println!(
        "  trading days/year: {}",
        config.backtest.trading_days_per_year
    );
    println!(
        "  meta-filter:       {}",
        config
            .meta_filter
            .artifact_path
            .as_deref()
            .unwrap_or("disabled")
    );
    Ok(())
}
