//! Instruments and the tradable universe.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency every price is normalised to.
pub const BASE_CURRENCY: &str = "USD";

/// A tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    /// Symbol
    pub symbol: String,
    /// Currency the instrument is quoted in
    pub quote_currency: String,
    /// Identifier assigned by the universe provider
    pub id: u64,
}

impl Instrument {
    /// Create a new instrument.
    pub fn new(symbol: impl Into<String>, quote_currency: impl Into<String>, id: u64) -> Self {
        Self {
            symbol: symbol.into(),
            quote_currency: quote_currency.into(),
            id,
        }
    }

    /// Whether prices need converting before they are comparable.
    pub fn needs_conversion(&self) -> bool {
        self.quote_currency != BASE_CURRENCY
    }

    /// Reference pair used to convert this instrument's prices to USD.
    pub fn reference_pair(&self) -> Option<String> {
        if self.needs_conversion() {
            Some(format!("{}{}", self.quote_currency, BASE_CURRENCY))
        } else {
            None
        }
    }
}

/// Cluster identifier assigned by the universe provider.
pub type ClusterId = u32;

/// The filtered, clustered universe announced to every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingUniverse {
    /// Tradable instruments keyed by symbol
    pub instruments: BTreeMap<String, Instrument>,
    /// Cluster assignment: cluster id to member symbols, in provider order
    pub clusters: BTreeMap<ClusterId, Vec<String>>,
    /// FX reference pairs (e.g. `EURUSD`) keyed by symbol
    pub reference_currencies: BTreeMap<String, u64>,
}

impl TradingUniverse {
    /// Create an empty universe.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument.
    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instruments.insert(instrument.symbol.clone(), instrument);
        self
    }

    /// Add a cluster.
    pub fn with_cluster(mut self, id: ClusterId, members: Vec<String>) -> Self {
        self.clusters.insert(id, members);
        self
    }

    /// Add an FX reference pair.
    pub fn with_reference(mut self, symbol: impl Into<String>, id: u64) -> Self {
        self.reference_currencies.insert(symbol.into(), id);
        self
    }

    /// Look up an instrument.
    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    /// Whether the symbol is a tradable instrument.
    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    /// Whether the symbol is an FX reference pair.
    pub fn is_reference(&self, symbol: &str) -> bool {
        self.reference_currencies.contains_key(symbol)
    }

    /// Tradable symbols in order.
    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.instruments.keys()
    }

    /// Number of tradable instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Check if the universe has no tradable instruments.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
