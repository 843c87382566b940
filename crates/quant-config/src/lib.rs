//! Configuration management.

mod settings;

pub use settings::{AppConfig, AppSettings, LoggingConfig, MetaFilterSettings};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from a TOML file with environment overrides.
///
/// Environment variables use the `QUANTFOLIO` prefix with `__` as the
/// section separator, e.g. `QUANTFOLIO__GATE__MIN_NET_BENEFIT=0.001`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("QUANTFOLIO")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Load configuration, falling back to defaults when the file is absent.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    load_config(path)
}
