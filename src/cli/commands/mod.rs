//! Command implementations.

pub mod backtest;
pub mod compare;
pub mod methods;
pub mod signals;
pub mod validate;

use anyhow::{Context, Result};
use quant_backtest::BacktestEngine;
use quant_config::AppConfig;
use quant_gate::{CostGate, MetaFilter, ModelArtifact};
use quant_signals::SignalGenerator;
use std::path::Path;

/// Assemble an engine from the application configuration.
pub fn build_engine(config: &AppConfig) -> Result<BacktestEngine> {
    config.validate().context("invalid configuration")?;

    let generator =
        SignalGenerator::new(config.signals.clone()).context("invalid signal configuration")?;
    let gate = CostGate::new(config.gate.clone(), config.cost.clone());

    let meta_filter = match &config.meta_filter.artifact_path {
        Some(path) => {
            let artifact = ModelArtifact::load(Path::new(path))
                .with_context(|| format!("loading meta-filter artifact from {path}"))?;
            Some(MetaFilter::new(artifact)?)
        }
        None => None,
    };

    BacktestEngine::new(
        config.backtest.clone(),
        generator,
        config.allocation.clone(),
        gate,
        meta_filter,
    )
    .context("assembling backtest engine")
}
