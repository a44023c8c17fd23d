//! Market data ingestion: trading-hour and outlier validation, state
//! collection, USD preprocessing and snapshot propagation.

mod csv_source;
pub mod hours;
pub mod stage;
pub mod window;

pub use csv_source::{parse_events, parse_timestamp, CsvEventSource};
pub use hours::{SymbolSessions, TradingHours, TradingInterval};
pub use stage::{DataConfig, DataStage};
pub use window::{CleanlinessWindow, PriceWindow, QuoteWindow, WindowVerdict};

use std::path::Path;
use tradeflow_core::error::DataError;
use tradeflow_core::types::MarketEvent;

/// Load market events from a CSV file.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<MarketEvent>, DataError> {
    CsvEventSource::new(path)?.load_all()
}
