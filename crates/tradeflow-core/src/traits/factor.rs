//! Factor computation trait definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{InstrumentState, SignalVector};

/// State of a factor for monitoring and serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorState {
    /// Factor name
    pub name: String,
    /// Whether the factor has seen enough data to take positions
    pub is_warmed_up: bool,
    /// Number of fresh observations processed
    pub observations: usize,
    /// Current indicator values
    pub indicators: HashMap<String, f64>,
}

/// Core factor trait.
///
/// A factor is scoped to a fixed subset of the universe (its factor
/// universe). The signal stage feeds it the latest state of each member and
/// then asks it for one direction per member.
pub trait FactorComputation: Send + Sync {
    /// Get the name of this factor.
    fn name(&self) -> &str;

    /// Receive the latest observed state of one member instrument.
    ///
    /// Called for every member on every pass, whether or not the
    /// instrument's state changed.
    fn receive_observation(&mut self, symbol: &str, observation: &InstrumentState);

    /// Produce a direction for each member of the factor universe.
    ///
    /// Members missing from the output are treated as zero.
    fn generate_signals(&mut self) -> SignalVector;

    /// Get the current factor state for monitoring.
    fn state(&self) -> FactorState;
}
