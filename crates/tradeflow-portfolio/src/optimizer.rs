//! Built-in risk optimizers.

use serde::{Deserialize, Serialize};
use tradeflow_core::traits::RiskOptimizer;
use tradeflow_core::types::Weights;

/// Returns weights unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughOptimizer;

impl RiskOptimizer for PassthroughOptimizer {
    fn optimize(&self, weights: &Weights) -> Weights {
        weights.clone()
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Clips every weight to `±max_abs_weight`.
#[derive(Debug, Clone, Copy)]
pub struct MaxWeightOptimizer {
    max_abs_weight: f64,
}

impl MaxWeightOptimizer {
    /// Create a new clipping optimizer.
    pub fn new(max_abs_weight: f64) -> Self {
        Self {
            max_abs_weight: max_abs_weight.abs(),
        }
    }
}

impl RiskOptimizer for MaxWeightOptimizer {
    fn optimize(&self, weights: &Weights) -> Weights {
        weights
            .iter()
            .map(|(symbol, w)| {
                (
                    symbol.clone(),
                    w.clamp(-self.max_abs_weight, self.max_abs_weight),
                )
            })
            .collect()
    }

    fn name(&self) -> &str {
        "max_weight"
    }
}

/// Optimizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OptimizerSettings {
    #[default]
    Passthrough,
    MaxWeight { max_abs_weight: f64 },
}

impl OptimizerSettings {
    /// Build the configured optimizer.
    pub fn build(&self) -> Box<dyn RiskOptimizer> {
        match self {
            OptimizerSettings::Passthrough => Box::new(PassthroughOptimizer),
            OptimizerSettings::MaxWeight { max_abs_weight } => {
                Box::new(MaxWeightOptimizer::new(*max_abs_weight))
            }
        }
    }
}
