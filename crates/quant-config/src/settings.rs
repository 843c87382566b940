//! Configuration structures.

use quant_allocate::AllocateConfig;
use quant_backtest::BacktestConfig;
use quant_core::PipelineError;
use quant_gate::{CostModel, GateConfig};
use quant_signals::SignalConfig;
use serde::{Deserialize, Serialize};

/// Main application configuration.
///
/// The pipeline consumes this; it does not own it. Each stage receives its
/// own section, threaded through explicitly — there is no process-wide
/// strategy state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub allocation: AllocateConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub cost: CostModel,
    #[serde(default)]
    pub meta_filter: MetaFilterSettings,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

impl AppConfig {
    /// Validate cross-section consistency.
    ///
    /// The trading-days constant appears in both the signal and backtest
    /// sections; they must agree or annualized numbers stop being
    /// comparable.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.signals.trading_days_per_year != self.backtest.trading_days_per_year {
            return Err(PipelineError::Config(format!(
                "trading_days_per_year disagrees between signals ({}) and backtest ({})",
                self.signals.trading_days_per_year, self.backtest.trading_days_per_year
            )));
        }
        self.signals.validate()?;
        self.allocation.validate()?;
        self.backtest.validate()?;
        if self.cost.commission_rate < 0.0 {
            return Err(PipelineError::Config(
                "commission_rate must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "quantfolio".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Meta-filter settings: the pipeline only ever loads a frozen artifact.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetaFilterSettings {
    /// Path to the versioned model artifact; `None` disables the filter.
    pub artifact_path: Option<String>,
}
