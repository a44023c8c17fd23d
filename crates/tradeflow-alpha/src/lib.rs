//! Alpha generation for the trading pipeline.
//!
//! The signal stage owns one factor instance per factor universe and sums
//! their directions into a single signal vector per event.

pub mod catalog;
pub mod derivation;
pub mod factors;
pub mod stage;

pub use catalog::{FactorCatalog, FactorInfo};
pub use derivation::DerivationRule;
pub use factors::{PairSpreadConfig, PairSpreadFactor, SerialMomentumConfig, SerialMomentumFactor};
pub use stage::{AlphaConfig, FactorKey, FactorSpec, SignalStage};
