//! Risk optimizer trait definition.

use crate::types::Weights;

/// Opaque risk optimizer used by the portfolio stage.
///
/// The only contract is that one weight comes back for every instrument
/// that went in.
pub trait RiskOptimizer: Send + Sync {
    /// Transform normalized weights into risk-adjusted weights.
    fn optimize(&self, weights: &Weights) -> Weights;

    /// Get the optimizer name.
    fn name(&self) -> &str;
}
