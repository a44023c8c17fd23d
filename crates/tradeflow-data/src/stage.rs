//! The data stage: validate, collect, preprocess and propagate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use tradeflow_core::error::{DataError, PipelineResult};
use tradeflow_core::traits::{
    Alerter, DataAlert, ObservedValue, SnapshotConsumer, UniverseConsumer,
};
use tradeflow_core::types::{EventKind, MarketEvent, MarketSnapshot, ObservedState, TradingUniverse};

use crate::hours::TradingHours;
use crate::window::{PriceWindow, QuoteWindow, WindowVerdict};

/// Data stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Observations held per cleanliness window
    pub window_capacity: usize,
    /// Maximum relative deviation from the window median
    pub max_relative_deviation: f64,
    /// Trading sessions
    pub trading_hours: TradingHours,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            window_capacity: 1000,
            max_relative_deviation: 0.333,
            trading_hours: TradingHours::default(),
        }
    }
}

/// Outlier test registered for one (symbol, event kind).
#[derive(Debug, Clone)]
enum OutlierHandler {
    Price(PriceWindow),
    AskBid(QuoteWindow),
}

/// Owns the latest observed state and the cleanliness windows.
pub struct DataStage {
    config: DataConfig,
    alerter: Arc<dyn Alerter>,
    universe: Arc<TradingUniverse>,
    state: ObservedState,
    handlers: HashMap<(String, EventKind), OutlierHandler>,
    departed: HashSet<String>,
}

impl DataStage {
    /// Create a new data stage.
    pub fn new(config: DataConfig, alerter: Arc<dyn Alerter>) -> Self {
        Self {
            config,
            alerter,
            universe: Arc::new(TradingUniverse::default()),
            state: ObservedState::new(),
            handlers: HashMap::new(),
            departed: HashSet::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Current observed state.
    pub fn state(&self) -> &ObservedState {
        &self.state
    }

    /// Number of observations in a cleanliness window.
    pub fn window_len(&self, symbol: &str, kind: EventKind) -> Option<usize> {
        self.handlers
            .get(&(symbol.to_string(), kind))
            .map(|handler| match handler {
                OutlierHandler::Price(window) => window.len(),
                OutlierHandler::AskBid(window) => window.len(),
            })
    }

    /// Check that an event is clean.
    ///
    /// Fails closed outside trading hours. Inside hours the event must pass
    /// the outlier test, which also grows the window on acceptance.
    /// Events for symbols dropped by a universe refresh are alerted and
    /// rejected. Returns an error for symbols or kinds with no registered
    /// handler.
    pub fn validate(&mut self, event: &MarketEvent) -> Result<bool, DataError> {
        let symbol = event.symbol();
        let kind = event.kind();

        if !self.universe.contains(symbol) && !self.universe.is_reference(symbol) {
            if self.departed.contains(symbol) {
                self.alerter.alert(&DataAlert::DepartedSymbol {
                    symbol: symbol.to_string(),
                    kind,
                    time: event.timestamp(),
                });
                return Ok(false);
            }
            return Err(DataError::UnknownSymbol(symbol.to_string()));
        }
        if !self.handlers.contains_key(&(symbol.to_string(), kind)) {
            return Err(DataError::UnsupportedEvent {
                symbol: symbol.to_string(),
                kind,
            });
        }

        if !self
            .config
            .trading_hours
            .is_open(symbol, event.time_of_day())
        {
            self.alerter.alert(&DataAlert::OutsideTradingHours {
                symbol: symbol.to_string(),
                kind,
                time: event.timestamp(),
            });
            return Ok(false);
        }

        self.assert_not_outlier(event)
    }

    fn assert_not_outlier(&mut self, event: &MarketEvent) -> Result<bool, DataError> {
        let max_dev = self.config.max_relative_deviation;
        let key = (event.symbol().to_string(), event.kind());
        let handler = self
            .handlers
            .get_mut(&key)
            .ok_or_else(|| DataError::UnsupportedEvent {
                symbol: key.0.clone(),
                kind: key.1,
            })?;

        let (value, verdict_median) = match (handler, event) {
            (OutlierHandler::Price(window), MarketEvent::Bar(bar)) => {
                let verdict = window.test_and_insert([bar.close], max_dev);
                (ObservedValue::Price(bar.close), rejected_price(verdict))
            }
            (OutlierHandler::Price(window), MarketEvent::Trade(trade)) => {
                let verdict = window.test_and_insert([trade.last], max_dev);
                (ObservedValue::Price(trade.last), rejected_price(verdict))
            }
            (OutlierHandler::AskBid(window), MarketEvent::Quote(quote)) => {
                let verdict = window.test_and_insert([quote.ask, quote.bid], max_dev);
                let median = match verdict {
                    WindowVerdict::Rejected { median: [ask, bid] } => {
                        Some(ObservedValue::AskBid { ask, bid })
                    }
                    _ => None,
                };
                (
                    ObservedValue::AskBid {
                        ask: quote.ask,
                        bid: quote.bid,
                    },
                    median,
                )
            }
            _ => {
                return Err(DataError::UnsupportedEvent {
                    symbol: key.0,
                    kind: key.1,
                })
            }
        };

        match verdict_median {
            Some(median) => {
                self.alerter.alert(&DataAlert::Outlier {
                    symbol: key.0,
                    kind: key.1,
                    value,
                    median,
                });
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Record a validated event into the observed state.
    ///
    /// Bars for FX reference pairs go to the reference table.
    pub fn collect(&mut self, event: &MarketEvent) -> Result<(), DataError> {
        let symbol = event.symbol();
        self.state.set_current_time(event.timestamp());

        if let MarketEvent::Bar(bar) = event {
            if self.state.record_reference_bar(bar.clone()) {
                return Ok(());
            }
        }

        let entry = self
            .state
            .instrument_mut(symbol)
            .ok_or_else(|| DataError::UnsupportedEvent {
                symbol: symbol.to_string(),
                kind: event.kind(),
            })?;

        match event {
            MarketEvent::Bar(bar) => entry.latest_bar = Some(bar.clone()),
            MarketEvent::Quote(quote) => entry.latest_quote = Some(quote.clone()),
            MarketEvent::Trade(trade) => entry.latest_trade = Some(trade.clone()),
            _ => {
                return Err(DataError::UnsupportedEvent {
                    symbol: symbol.to_string(),
                    kind: event.kind(),
                })
            }
        }
        Ok(())
    }

    /// Derive the USD price from a quote.
    ///
    /// Non-USD quotes are converted with the latest close of the
    /// `{CCY}USD` reference bar. Without one the USD price is left as it was
    /// and a `MissingReference` alert is raised.
    pub fn preprocess(&mut self, event: &MarketEvent) {
        let MarketEvent::Quote(quote) = event else {
            return;
        };
        let Some(instrument) = self.universe.instrument(&quote.symbol) else {
            return;
        };

        let mut usd_price = quote.mid();
        if let Some(pair) = instrument.reference_pair() {
            match self.state.reference_bar(&pair) {
                Some(reference) => usd_price *= reference.close,
                None => {
                    self.alerter.alert(&DataAlert::MissingReference {
                        symbol: quote.symbol.clone(),
                        pair,
                    });
                    return;
                }
            }
        }

        if let Some(entry) = self.state.instrument_mut(&quote.symbol) {
            entry.usd_price = Some(usd_price);
        }
    }

    /// Take a snapshot of the current state.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.state.snapshot()
    }

    /// Hand every consumer the same snapshot of the current state.
    pub fn propagate(&self, consumers: &mut [&mut dyn SnapshotConsumer]) {
        let snapshot = self.snapshot();
        for consumer in consumers.iter_mut() {
            consumer.receive_snapshot(Arc::clone(&snapshot));
        }
        debug!(
            consumers = consumers.len(),
            time = ?snapshot.current_time(),
            "Propagated market snapshot"
        );
    }

    fn rebuild_handlers(&mut self) {
        let capacity = self.config.window_capacity;
        let universe = Arc::clone(&self.universe);

        let departed = &mut self.departed;
        self.handlers.retain(|(symbol, _), _| {
            let active = universe.contains(symbol) || universe.is_reference(symbol);
            if !active {
                departed.insert(symbol.clone());
            }
            active
        });
        departed.retain(|symbol| !universe.contains(symbol) && !universe.is_reference(symbol));

        for symbol in universe.symbols() {
            for kind in EventKind::all() {
                self.handlers
                    .entry((symbol.clone(), *kind))
                    .or_insert_with(|| match kind {
                        EventKind::Quote => OutlierHandler::AskBid(QuoteWindow::new(capacity)),
                        _ => OutlierHandler::Price(PriceWindow::new(capacity)),
                    });
            }
        }
        // FX references only carry bars
        for symbol in universe.reference_currencies.keys() {
            self.handlers
                .entry((symbol.clone(), EventKind::Bar))
                .or_insert_with(|| OutlierHandler::Price(PriceWindow::new(capacity)));
        }
    }
}

fn rejected_price(verdict: WindowVerdict<1>) -> Option<ObservedValue> {
    match verdict {
        WindowVerdict::Rejected { median: [m] } => Some(ObservedValue::Price(m)),
        _ => None,
    }
}

impl UniverseConsumer for DataStage {
    fn receive_universe(&mut self, universe: Arc<TradingUniverse>) {
        self.universe = universe;
    }

    fn initialise(&mut self) -> PipelineResult<()> {
        self.state.initialise(&self.universe);
        self.rebuild_handlers();
        info!(
            instruments = self.universe.len(),
            references = self.universe.reference_currencies.len(),
            windows = self.handlers.len(),
            departed = self.departed.len(),
            "Data stage initialised"
        );
        Ok(())
    }
}
