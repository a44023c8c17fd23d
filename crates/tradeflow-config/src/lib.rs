//! Configuration management.

mod settings;

pub use settings::{AppConfig, AppSettings, LoggingConfig, SettingsError};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables prefixed `TRADEFLOW__` override file values, with
/// `__` separating nested keys (`TRADEFLOW__PORTFOLIO__FIRM_EQUITY`).
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("TRADEFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// Load configuration and reject invalid settings.
pub fn load_validated(path: &Path) -> Result<AppConfig, SettingsError> {
    let config = load_config(path)?;
    config.validate()?;
    Ok(config)
}
