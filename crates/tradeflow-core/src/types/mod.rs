//! Core data types for the trading pipeline.

mod market;
mod order;
mod state;
mod universe;
mod vectors;

pub use market::{Bar, EventKind, MarketEvent, Quote, Trade};
pub use order::{ChildOrder, Side};
pub use state::{InstrumentState, MarketSnapshot, ObservedState};
pub use universe::{ClusterId, Instrument, TradingUniverse, BASE_CURRENCY};
pub use vectors::{OrderVector, SignalVector, TargetPortfolio, Weights};
