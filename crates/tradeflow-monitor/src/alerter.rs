//! Alerter that reports through `tracing`.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;
use tradeflow_core::traits::{Alerter, DataAlert, ObservedValue};

/// Logs every data-quality alert at WARN and counts them.
#[derive(Debug, Default)]
pub struct TracingAlerter {
    raised: AtomicU64,
}

impl TracingAlerter {
    /// Create a new alerter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of alerts raised so far.
    pub fn count(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }
}

fn describe(value: &ObservedValue) -> String {
    match value {
        ObservedValue::Price(price) => format!("{:.6}", price),
        ObservedValue::AskBid { ask, bid } => format!("ask={:.6} bid={:.6}", ask, bid),
    }
}

impl Alerter for TracingAlerter {
    fn alert(&self, alert: &DataAlert) {
        self.raised.fetch_add(1, Ordering::Relaxed);

        match alert {
            DataAlert::OutsideTradingHours { symbol, kind, time } => {
                warn!(symbol = %symbol, kind = %kind, time = %time, "Event outside trading hours");
            }
            DataAlert::Outlier {
                symbol,
                kind,
                value,
                median,
            } => {
                warn!(
                    symbol = %symbol,
                    kind = %kind,
                    value = %describe(value),
                    median = %describe(median),
                    "Outlier rejected"
                );
            }
            DataAlert::MissingReference { symbol, pair } => {
                warn!(symbol = %symbol, pair = %pair, "No reference bar for USD conversion");
            }
            DataAlert::DepartedSymbol { symbol, kind, time } => {
                warn!(symbol = %symbol, kind = %kind, time = %time, "Event for instrument no longer in universe");
            }
        }
    }
}
