//! Error types for the trading pipeline.

use thiserror::Error;
use uuid::Uuid;

use crate::types::EventKind;

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    #[error("Portfolio error: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Universe error: {0}")]
    Universe(#[from] UniverseError),

    #[error("Invalid pipeline state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl PipelineError {
    /// Whether the event loop may keep going after this error.
    ///
    /// Only dispatch failures qualify: the failed order has been put back on
    /// the pending queue and will be replayed on the next pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Execution(ExecutionError::DispatchFailed { .. })
        )
    }
}

/// Data stage errors.
///
/// Data-quality rejections are not errors; these are programming or input
/// errors that must abort processing of the current event.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Unsupported event: no {kind} handler for {symbol}")]
    UnsupportedEvent { symbol: String, kind: EventKind },

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("No data available: {0}")]
    NoDataAvailable(String),
}

/// Signal stage errors.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Signals requested before the first aggregation")]
    NotAggregated,

    #[error("Unknown factor: {0}")]
    UnknownFactor(String),

    #[error("Invalid factor configuration: {0}")]
    InvalidConfig(String),
}

/// Portfolio stage conditions.
///
/// Both are handled by the stage's documented fallback policies; the
/// `try_*` operations surface them for callers that want to decide.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Division by zero while {stage}")]
    DivisionByZero { stage: &'static str },

    #[error("Insufficient data: no USD price for {symbol}")]
    InsufficientData { symbol: String },
}

/// Order dispatch errors reported by an [`OrderDispatcher`](crate::traits::OrderDispatcher).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
}

/// Execution stage errors.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Dispatch of order {order_id} failed: {source}")]
    DispatchFailed {
        order_id: Uuid,
        #[source]
        source: DispatchError,
    },
}

/// Universe provider errors.
#[derive(Error, Debug)]
pub enum UniverseError {
    #[error("Universe retrieval failed: {0}")]
    Retrieval(String),

    #[error("Subscription failed for {symbol}: {reason}")]
    Subscription { symbol: String, reason: String },

    #[error("Universe is empty after filtering")]
    Empty,
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
