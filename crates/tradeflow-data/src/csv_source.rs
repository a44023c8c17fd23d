//! CSV market event source.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tradeflow_core::error::DataError;
use tradeflow_core::types::{Bar, EventKind, MarketEvent, Quote, Trade};

/// One row of an event file. Unused columns may be left empty.
#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(alias = "Kind", alias = "type")]
    kind: String,
    #[serde(alias = "Symbol", alias = "ticker")]
    symbol: String,
    #[serde(alias = "Timestamp", alias = "date", alias = "Date", alias = "time")]
    timestamp: String,
    #[serde(default, alias = "Open")]
    open: Option<f64>,
    #[serde(default, alias = "High")]
    high: Option<f64>,
    #[serde(default, alias = "Low")]
    low: Option<f64>,
    #[serde(default, alias = "Close")]
    close: Option<f64>,
    #[serde(default, alias = "Volume")]
    volume: Option<f64>,
    #[serde(default, alias = "Bid")]
    bid: Option<f64>,
    #[serde(default, alias = "Ask")]
    ask: Option<f64>,
    #[serde(default, alias = "Last", alias = "price")]
    last: Option<f64>,
    #[serde(default, alias = "Size")]
    size: Option<f64>,
}

/// Historical market events stored as CSV.
///
/// Columns: `kind,symbol,timestamp,open,high,low,close,volume,bid,ask,last,size`.
pub struct CsvEventSource {
    path: PathBuf,
}

impl CsvEventSource {
    /// Create a new CSV event source.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NoDataAvailable(path.display().to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every event, ordered by timestamp.
    pub fn load_all(&self) -> Result<Vec<MarketEvent>, DataError> {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| DataError::ParseError(e.to_string()))?;
        read_events(reader)
    }
}

/// Parse events from any reader.
pub fn parse_events<R: Read>(input: R) -> Result<Vec<MarketEvent>, DataError> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    read_events(reader)
}

fn read_events<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<MarketEvent>, DataError> {
    let mut events = Vec::new();
    for (line, result) in reader.deserialize().enumerate() {
        let record: EventRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
        let event = to_event(record).map_err(|e| match e {
            DataError::ParseError(msg) => DataError::ParseError(format!("row {}: {}", line + 1, msg)),
            other => other,
        })?;
        events.push(event);
    }

    // Stable: rows sharing a timestamp keep file order
    events.sort_by_key(MarketEvent::timestamp);
    Ok(events)
}

fn to_event(record: EventRecord) -> Result<MarketEvent, DataError> {
    let timestamp = parse_timestamp(&record.timestamp)?;
    let kind = parse_kind(&record.kind)?;
    let symbol = record.symbol;

    let event = match kind {
        EventKind::Bar => {
            let close = required(record.close, "close")?;
            Bar::new(
                symbol,
                timestamp,
                record.open.unwrap_or(close),
                record.high.unwrap_or(close),
                record.low.unwrap_or(close),
                close,
                record.volume.unwrap_or(0.0),
            )
            .into()
        }
        EventKind::Quote => Quote::new(
            symbol,
            timestamp,
            required(record.bid, "bid")?,
            required(record.ask, "ask")?,
        )
        .into(),
        EventKind::Trade => Trade::new(
            symbol,
            timestamp,
            required(record.last, "last")?,
            record.size.unwrap_or(0.0),
        )
        .into(),
    };
    Ok(event)
}

fn parse_kind(kind: &str) -> Result<EventKind, DataError> {
    match kind.to_ascii_lowercase().as_str() {
        "bar" => Ok(EventKind::Bar),
        "quote" => Ok(EventKind::Quote),
        "trade" => Ok(EventKind::Trade),
        other => Err(DataError::ParseError(format!("unknown event kind: {}", other))),
    }
}

fn required(value: Option<f64>, column: &str) -> Result<f64, DataError> {
    value.ok_or_else(|| DataError::ParseError(format!("missing column: {}", column)))
}

/// Parse the timestamp formats found in exported market data.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DataError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    if let Ok(ts) = value.parse::<i64>() {
        // Milliseconds past 10 digits
        let parsed = if ts > 10_000_000_000 {
            DateTime::from_timestamp_millis(ts)
        } else {
            DateTime::from_timestamp(ts, 0)
        };
        if let Some(dt) = parsed {
            return Ok(dt);
        }
    }

    Err(DataError::ParseError(format!("could not parse timestamp: {}", value)))
}
