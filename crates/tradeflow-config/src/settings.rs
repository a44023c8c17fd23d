//! Configuration structures.

use config::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tradeflow_alpha::AlphaConfig;
use tradeflow_data::DataConfig;
use tradeflow_engine::{EngineConfig, StaticUniverseConfig, StaticUniverseProvider};
use tradeflow_execution::{ExecutionConfig, SlicingPolicy};
use tradeflow_portfolio::{OptimizerSettings, PortfolioConfig};

/// Configuration errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub universe: StaticUniverseConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub alpha: AlphaConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub engine: EngineConfig,
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
            name: "tradeflow".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Whether logs are emitted as JSON.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Check settings that deserialization alone cannot.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "pretty" | "json") {
            return Err(invalid("logging.format", "expected \"pretty\" or \"json\""));
        }

        let symbols: BTreeSet<&str> = self
            .universe
            .instruments
            .iter()
            .map(|i| i.symbol.as_str())
            .collect();
        if symbols.is_empty() {
            return Err(invalid("universe.instruments", "at least one instrument required"));
        }
        if symbols.len() != self.universe.instruments.len() {
            return Err(invalid("universe.instruments", "duplicate symbol"));
        }
        for member in self.universe.clusters.iter().flatten() {
            if !symbols.contains(member.as_str()) {
                return Err(invalid(
                    "universe.clusters",
                    format!("unknown instrument {}", member),
                ));
            }
        }

        if self.data.window_capacity == 0 {
            return Err(invalid("data.window_capacity", "must be greater than 0"));
        }
        if !(self.data.max_relative_deviation > 0.0) {
            return Err(invalid("data.max_relative_deviation", "must be positive"));
        }
        if !self.data.trading_hours.has_sessions() {
            return Err(invalid("data.trading_hours", "no trading sessions configured"));
        }

        let universe = StaticUniverseProvider::new(self.universe.clone())
            .build_universe()
            .map_err(|e| invalid("universe", e.to_string()))?;
        self.alpha
            .check_against(&universe)
            .map_err(|e| invalid("alpha.factors", e.to_string()))?;

        if self.portfolio.firm_equity <= Decimal::ZERO {
            return Err(invalid("portfolio.firm_equity", "must be positive"));
        }
        if !(self.portfolio.default_leverage > 0.0)
            || self.portfolio.leverage.iter().any(|l| !(l.leverage > 0.0))
        {
            return Err(invalid("portfolio.leverage", "must be positive"));
        }
        if let OptimizerSettings::MaxWeight { max_abs_weight } = self.portfolio.optimizer {
            if !(max_abs_weight > 0.0) {
                return Err(invalid("portfolio.optimizer.max_abs_weight", "must be positive"));
            }
        }

        if let SlicingPolicy::MaxClip { max_quantity: 0 } = self.execution.slicing {
            return Err(invalid("execution.slicing.max_quantity", "must be greater than 0"));
        }
        if self.engine.refresh_interval_secs == Some(0) {
            return Err(invalid("engine.refresh_interval_secs", "must be greater than 0"));
        }

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
