//! Portfolio construction.
//!
//! Turns aggregated signals into integer target positions sized to firm
//! equity, and diffs them against the previous targets to produce orders.

mod optimizer;
mod stage;

pub use optimizer::{MaxWeightOptimizer, OptimizerSettings, PassthroughOptimizer};
pub use stage::{InstrumentLeverage, NormalizationPolicy, PortfolioConfig, PortfolioStage};
