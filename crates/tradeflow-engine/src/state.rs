//! Pipeline lifecycle and counters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No universe yet
    Uninitialized,
    /// Stages initialised, not yet accepting events
    UniverseReady,
    /// Accepting market events
    Running,
}

impl PipelineState {
    /// Static name used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::UniverseReady => "universe_ready",
            PipelineState::Running => "running",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters kept by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Events handed to `on_event`
    pub events_received: u64,
    /// Events rejected by validation
    pub events_dropped: u64,
    /// Full pipeline passes run
    pub passes: u64,
    /// Orders dispatched
    pub orders_dispatched: u64,
    /// Dispatch attempts that failed
    pub dispatch_failures: u64,
    /// Universe refreshes after the initial load
    pub refreshes: u64,
}

impl PipelineStats {
    /// Fraction of received events that were dropped.
    pub fn drop_rate(&self) -> f64 {
        if self.events_received == 0 {
            0.0
        } else {
            self.events_dropped as f64 / self.events_received as f64
        }
    }
}
