//! Data-quality alerting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EventKind;

/// Value that failed an outlier check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedValue {
    /// Bar close or trade last price
    Price(f64),
    /// Quote ask and bid
    AskBid { ask: f64, bid: f64 },
}

/// Structured warning raised by the data stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum DataAlert {
    /// Event arrived outside every configured trading interval
    OutsideTradingHours {
        symbol: String,
        kind: EventKind,
        time: DateTime<Utc>,
    },
    /// Event deviated too far from the median of its cleanliness window
    Outlier {
        symbol: String,
        kind: EventKind,
        value: ObservedValue,
        median: ObservedValue,
    },
    /// No reference bar yet to convert a quote to USD
    MissingReference { symbol: String, pair: String },
    /// Event for a symbol that left the universe on a refresh
    DepartedSymbol {
        symbol: String,
        kind: EventKind,
        time: DateTime<Utc>,
    },
}

impl DataAlert {
    /// Symbol the alert refers to.
    pub fn symbol(&self) -> &str {
        match self {
            DataAlert::OutsideTradingHours { symbol, .. }
            | DataAlert::Outlier { symbol, .. }
            | DataAlert::MissingReference { symbol, .. }
            | DataAlert::DepartedSymbol { symbol, .. } => symbol,
        }
    }
}

/// Sink for data-quality alerts. Must never fail or panic.
pub trait Alerter: Send + Sync {
    /// Report one alert.
    fn alert(&self, alert: &DataAlert);
}

/// Alerter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAlerter;

impl Alerter for NullAlerter {
    fn alert(&self, _alert: &DataAlert) {}
}
