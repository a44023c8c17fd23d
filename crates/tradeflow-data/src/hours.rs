//! Trading-hour intervals.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One trading session, bounds exclusive.
///
/// When `end < start` the session wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TradingInterval {
    /// Create a new interval.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Build from hour/minute pairs. Panics on invalid times.
    pub fn hm(start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            start: NaiveTime::from_hms_opt(start.0, start.1, 0).expect("valid start time"),
            end: NaiveTime::from_hms_opt(end.0, end.1, 0).expect("valid end time"),
        }
    }

    /// Whether the interval wraps past midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    /// Check whether a time of day falls strictly inside the interval.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.wraps_midnight() {
            self.start < time || time < self.end
        } else {
            self.start < time && time < self.end
        }
    }
}

/// Sessions of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSessions {
    pub symbol: String,
    pub intervals: Vec<TradingInterval>,
}

/// Trading hours per symbol with an optional default.
///
/// Overrides are a list of `{ symbol, intervals }` entries so symbols keep
/// their case through layered config loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingHours {
    /// Sessions used for symbols without their own entry
    #[serde(default)]
    pub default: Vec<TradingInterval>,
    /// Per-symbol sessions
    #[serde(default)]
    pub symbols: Vec<SymbolSessions>,
}

impl TradingHours {
    /// Hours that apply to every symbol.
    pub fn uniform(intervals: Vec<TradingInterval>) -> Self {
        Self {
            default: intervals,
            symbols: Vec::new(),
        }
    }

    /// Override the sessions of one symbol.
    pub fn with_symbol(mut self, symbol: impl Into<String>, intervals: Vec<TradingInterval>) -> Self {
        let symbol = symbol.into();
        match self.symbols.iter_mut().find(|s| s.symbol == symbol) {
            Some(entry) => entry.intervals = intervals,
            None => self.symbols.push(SymbolSessions { symbol, intervals }),
        }
        self
    }

    /// Sessions for a symbol.
    pub fn intervals_for(&self, symbol: &str) -> &[TradingInterval] {
        self.symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.intervals.as_slice())
            .unwrap_or(&self.default)
    }

    /// Whether any session is configured at all.
    pub fn has_sessions(&self) -> bool {
        !self.default.is_empty() || self.symbols.iter().any(|s| !s.intervals.is_empty())
    }

    /// Fails closed: a symbol with no sessions is never within hours.
    pub fn is_open(&self, symbol: &str, time: NaiveTime) -> bool {
        self.intervals_for(symbol)
            .iter()
            .any(|interval| interval.contains(time))
    }
}
