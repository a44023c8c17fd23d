//! Latest observed market state and the snapshots handed to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Bar, Quote, Trade, TradingUniverse};

/// Latest observations for one tradable instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub latest_bar: Option<Bar>,
    pub latest_quote: Option<Quote>,
    pub latest_trade: Option<Trade>,
    /// Quote mid converted to USD; `None` means insufficient data, not zero.
    pub usd_price: Option<f64>,
}

impl InstrumentState {
    /// Timestamp of the quote that produced the current USD price.
    pub fn quote_time(&self) -> Option<DateTime<Utc>> {
        self.latest_quote.as_ref().map(|q| q.timestamp)
    }
}

/// Latest observed state for the whole universe.
///
/// Only the data stage holds a mutable instance. Everyone else sees a
/// [`MarketSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    instruments: BTreeMap<String, InstrumentState>,
    references: BTreeMap<String, Option<Bar>>,
    current_time: Option<DateTime<Utc>>,
}

/// Immutable view of [`ObservedState`] as of one event.
pub type MarketSnapshot = Arc<ObservedState>;

impl ObservedState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild entries for a new universe.
    ///
    /// Entries for symbols that remain in the universe keep their
    /// observations; new symbols start empty and departed ones are dropped.
    pub fn initialise(&mut self, universe: &TradingUniverse) {
        self.instruments.retain(|symbol, _| universe.contains(symbol));
        for symbol in universe.symbols() {
            self.instruments.entry(symbol.clone()).or_default();
        }

        self.references.retain(|symbol, _| universe.is_reference(symbol));
        for symbol in universe.reference_currencies.keys() {
            self.references.entry(symbol.clone()).or_default();
        }
    }

    /// State for an instrument.
    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentState> {
        self.instruments.get(symbol)
    }

    /// Mutable state for an instrument.
    pub fn instrument_mut(&mut self, symbol: &str) -> Option<&mut InstrumentState> {
        self.instruments.get_mut(symbol)
    }

    /// Iterate over all instruments.
    pub fn instruments(&self) -> impl Iterator<Item = (&String, &InstrumentState)> {
        self.instruments.iter()
    }

    /// USD price for an instrument, if one has been derived.
    pub fn usd_price(&self, symbol: &str) -> Option<f64> {
        self.instruments.get(symbol).and_then(|s| s.usd_price)
    }

    /// Latest bar of a reference currency pair.
    pub fn reference_bar(&self, symbol: &str) -> Option<&Bar> {
        self.references.get(symbol).and_then(|b| b.as_ref())
    }

    /// Record a reference currency bar. Returns false for unknown pairs.
    pub fn record_reference_bar(&mut self, bar: Bar) -> bool {
        match self.references.get_mut(&bar.symbol) {
            Some(slot) => {
                *slot = Some(bar);
                true
            }
            None => false,
        }
    }

    /// Time of the most recently collected event.
    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.current_time
    }

    /// Advance the current time.
    pub fn set_current_time(&mut self, time: DateTime<Utc>) {
        self.current_time = Some(time);
    }

    /// Take an immutable snapshot.
    pub fn snapshot(&self) -> MarketSnapshot {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Instrument;
    use chrono::TimeZone;

    fn universe(symbols: &[&str]) -> TradingUniverse {
        symbols
            .iter()
            .enumerate()
            .fold(TradingUniverse::new(), |u, (i, s)| {
                u.with_instrument(Instrument::new(*s, "USD", i as u64))
            })
            .with_reference("EURUSD", 99)
    }

    #[test]
    fn test_initialise_retains_surviving_entries() {
        let mut state = ObservedState::new();
        state.initialise(&universe(&["A", "B"]));
        state.instrument_mut("A").unwrap().usd_price = Some(10.0);

        state.initialise(&universe(&["A", "C"]));

        assert_eq!(state.usd_price("A"), Some(10.0));
        assert!(state.instrument("B").is_none());
        assert_eq!(state.instrument("C"), Some(&InstrumentState::default()));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut state = ObservedState::new();
        state.initialise(&universe(&["A"]));
        let snapshot = state.snapshot();

        state.instrument_mut("A").unwrap().usd_price = Some(5.0);
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        state.record_reference_bar(Bar::new("EURUSD", ts, 1.1, 1.1, 1.1, 1.1, 0.0));

        assert_eq!(snapshot.usd_price("A"), None);
        assert!(snapshot.reference_bar("EURUSD").is_none());
        assert_eq!(state.reference_bar("EURUSD").map(|b| b.close), Some(1.1));
    }

    #[test]
    fn test_unknown_reference_is_not_recorded() {
        let mut state = ObservedState::new();
        state.initialise(&universe(&["A"]));
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();

        assert!(!state.record_reference_bar(Bar::new("GBPUSD", ts, 1.3, 1.3, 1.3, 1.3, 0.0)));
    }
}
