//! Core traits for the trading pipeline.

mod alerter;
mod consumer;
mod dispatcher;
mod factor;
mod optimizer;
mod universe;

pub use alerter::{Alerter, DataAlert, NullAlerter, ObservedValue};
pub use consumer::{SnapshotConsumer, UniverseConsumer};
pub use dispatcher::OrderDispatcher;
pub use factor::{FactorComputation, FactorState};
pub use optimizer::RiskOptimizer;
pub use universe::UniverseProvider;
