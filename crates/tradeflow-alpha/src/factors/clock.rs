//! Quote freshness tracking shared by the built-in factors.

use std::collections::HashMap;
use tradeflow_core::types::InstrumentState;

#[derive(Debug, Clone, Copy)]
struct Sample {
    price: f64,
    quote_millis: i64,
    consumed: bool,
}

/// Latest USD price per member and whether it has been consumed.
///
/// Factors are fed every member's state on every pass; only a new quote
/// timestamp counts as a fresh observation.
#[derive(Debug, Default, Clone)]
pub(crate) struct QuoteClock {
    latest: HashMap<String, Sample>,
}

impl QuoteClock {
    /// Record a member's state.
    pub(crate) fn observe(&mut self, symbol: &str, state: &InstrumentState) {
        let (Some(price), Some(time)) = (state.usd_price, state.quote_time()) else {
            return;
        };
        let quote_millis = time.timestamp_millis();
        match self.latest.get_mut(symbol) {
            Some(sample) if sample.quote_millis == quote_millis => sample.price = price,
            _ => {
                self.latest.insert(
                    symbol.to_string(),
                    Sample {
                        price,
                        quote_millis,
                        consumed: false,
                    },
                );
            }
        }
    }

    /// Latest price of a member.
    pub(crate) fn price(&self, symbol: &str) -> Option<f64> {
        self.latest.get(symbol).map(|s| s.price)
    }

    /// Whether any member has an unconsumed quote.
    pub(crate) fn has_fresh(&self) -> bool {
        self.latest.values().any(|s| !s.consumed)
    }

    /// Mark every quote as consumed.
    pub(crate) fn consume(&mut self) {
        for sample in self.latest.values_mut() {
            sample.consumed = true;
        }
    }
}
