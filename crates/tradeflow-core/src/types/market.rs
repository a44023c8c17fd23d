//! Market data events.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV bar for one instrument or reference currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Symbol
    pub symbol: String,
    /// Bar timestamp
    pub timestamp: DateTime<Utc>,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Trading volume
    pub volume: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Calculate the typical price (HLC average).
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Top-of-book quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol
    pub symbol: String,
    /// Quote timestamp
    pub timestamp: DateTime<Utc>,
    /// Best bid price
    pub bid: f64,
    /// Best ask price
    pub ask: f64,
}

impl Quote {
    /// Create a new quote.
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            bid,
            ask,
        }
    }

    /// Get the mid price.
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Get the spread.
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Last-sale print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Symbol
    pub symbol: String,
    /// Trade timestamp
    pub timestamp: DateTime<Utc>,
    /// Last traded price
    pub last: f64,
    /// Traded size
    pub size: f64,
}

impl Trade {
    /// Create a new trade.
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>, last: f64, size: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            last,
            size,
        }
    }
}

/// Kind of a market event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Bar,
    Quote,
    Trade,
}

impl EventKind {
    /// All kinds an instrument can receive.
    pub fn all() -> &'static [EventKind] {
        &[EventKind::Bar, EventKind::Quote, EventKind::Trade]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Bar => "bar",
            EventKind::Quote => "quote",
            EventKind::Trade => "trade",
        };
        write!(f, "{}", s)
    }
}

/// A market data event as received from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[non_exhaustive]
pub enum MarketEvent {
    Bar(Bar),
    Quote(Quote),
    Trade(Trade),
}

impl MarketEvent {
    /// Symbol the event refers to.
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Bar(bar) => &bar.symbol,
            MarketEvent::Quote(quote) => &quote.symbol,
            MarketEvent::Trade(trade) => &trade.symbol,
        }
    }

    /// Event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MarketEvent::Bar(bar) => bar.timestamp,
            MarketEvent::Quote(quote) => quote.timestamp,
            MarketEvent::Trade(trade) => trade.timestamp,
        }
    }

    /// Time of day used for trading-hour checks.
    pub fn time_of_day(&self) -> NaiveTime {
        self.timestamp().time()
    }

    /// Event kind.
    pub fn kind(&self) -> EventKind {
        match self {
            MarketEvent::Bar(_) => EventKind::Bar,
            MarketEvent::Quote(_) => EventKind::Quote,
            MarketEvent::Trade(_) => EventKind::Trade,
        }
    }
}

impl From<Bar> for MarketEvent {
    fn from(bar: Bar) -> Self {
        MarketEvent::Bar(bar)
    }
}

impl From<Quote> for MarketEvent {
    fn from(quote: Quote) -> Self {
        MarketEvent::Quote(quote)
    }
}

impl From<Trade> for MarketEvent {
    fn from(trade: Trade) -> Self {
        MarketEvent::Trade(trade)
    }
}
