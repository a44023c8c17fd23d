//! Catalog of built-in factor kinds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tradeflow_core::error::SignalError;
use tradeflow_core::traits::FactorComputation;

use crate::derivation::DerivationRule;
use crate::factors::{PairSpreadConfig, PairSpreadFactor, SerialMomentumConfig, SerialMomentumFactor};

/// Information about a factor kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorInfo {
    /// Factor kind as used in configuration
    pub kind: String,
    /// Factor description
    pub description: String,
    /// Default parameters as JSON
    pub default_params: serde_json::Value,
    /// Rule used when the configuration does not name one
    pub default_derivation: DerivationRule,
}

/// Catalog of available factor kinds.
pub struct FactorCatalog {
    factors: BTreeMap<String, FactorInfo>,
}

impl FactorCatalog {
    /// Create a new catalog with all built-in factors.
    pub fn new() -> Self {
        let mut factors = BTreeMap::new();

        factors.insert(
            "pair_spread".to_string(),
            FactorInfo {
                kind: "pair_spread".to_string(),
                description: "Kalman-filtered hedge ratio between two instruments, \
                              trading z-score excursions of the spread"
                    .to_string(),
                default_params: to_json(&PairSpreadConfig::default()),
                default_derivation: DerivationRule::ClusterPairs,
            },
        );

        factors.insert(
            "serial_momentum".to_string(),
            FactorInfo {
                kind: "serial_momentum".to_string(),
                description: "Sign of the lookback return held for a fixed period".to_string(),
                default_params: to_json(&SerialMomentumConfig::default()),
                default_derivation: DerivationRule::EachInstrument,
            },
        );

        Self { factors }
    }

    /// List all factor kinds.
    pub fn list(&self) -> Vec<&FactorInfo> {
        self.factors.values().collect()
    }

    /// Get factor info by kind.
    pub fn get(&self, kind: &str) -> Option<&FactorInfo> {
        self.factors.get(kind)
    }

    /// Check if a factor kind exists.
    pub fn exists(&self, kind: &str) -> bool {
        self.factors.contains_key(kind)
    }

    /// Create a factor over `members` from JSON parameters.
    ///
    /// `null` parameters mean the defaults.
    pub fn create(
        &self,
        kind: &str,
        params: &serde_json::Value,
        members: &[String],
    ) -> Result<Box<dyn FactorComputation>, SignalError> {
        let params = if params.is_null() {
            self.get(kind)
                .map(|info| info.default_params.clone())
                .ok_or_else(|| SignalError::UnknownFactor(kind.to_string()))?
        } else {
            params.clone()
        };

        match kind {
            "pair_spread" => {
                let config: PairSpreadConfig = serde_json::from_value(params)
                    .map_err(|e| SignalError::InvalidConfig(e.to_string()))?;
                config.validate()?;
                match members {
                    [first, second] => Ok(Box::new(PairSpreadFactor::new(config, first, second))),
                    _ => Err(SignalError::InvalidConfig(format!(
                        "pair_spread needs exactly 2 instruments, got {}",
                        members.len()
                    ))),
                }
            }
            "serial_momentum" => {
                let config: SerialMomentumConfig = serde_json::from_value(params)
                    .map_err(|e| SignalError::InvalidConfig(e.to_string()))?;
                config.validate()?;
                match members {
                    [symbol] => Ok(Box::new(SerialMomentumFactor::new(config, symbol))),
                    _ => Err(SignalError::InvalidConfig(format!(
                        "serial_momentum needs exactly 1 instrument, got {}",
                        members.len()
                    ))),
                }
            }
            _ => Err(SignalError::UnknownFactor(kind.to_string())),
        }
    }

    /// Create a factor with default parameters.
    pub fn create_default(
        &self,
        kind: &str,
        members: &[String],
    ) -> Result<Box<dyn FactorComputation>, SignalError> {
        self.create(kind, &serde_json::Value::Null, members)
    }
}

impl Default for FactorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
