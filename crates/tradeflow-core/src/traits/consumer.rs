//! Announcement traits implemented by pipeline stages.

use std::sync::Arc;

use crate::error::PipelineResult;
use crate::types::{MarketSnapshot, TradingUniverse};

/// Receives universe announcements from the orchestrator.
pub trait UniverseConsumer {
    /// Store the newly announced universe.
    fn receive_universe(&mut self, universe: Arc<TradingUniverse>);

    /// Rebuild per-instrument structures for the stored universe.
    fn initialise(&mut self) -> PipelineResult<()>;
}

/// Receives market snapshots from the data stage.
pub trait SnapshotConsumer {
    /// Store the snapshot taken for the current event.
    fn receive_snapshot(&mut self, snapshot: MarketSnapshot);
}
