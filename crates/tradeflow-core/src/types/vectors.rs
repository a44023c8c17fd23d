//! Per-instrument vectors passed between stages.

use std::collections::BTreeMap;

/// Aggregated direction per instrument, produced once per event.
pub type SignalVector = BTreeMap<String, f64>;

/// Portfolio weights per instrument.
pub type Weights = BTreeMap<String, f64>;

/// Target integer position per instrument.
pub type TargetPortfolio = BTreeMap<String, i64>;

/// Signed quantity to trade per instrument (new target minus previous).
pub type OrderVector = BTreeMap<String, i64>;
