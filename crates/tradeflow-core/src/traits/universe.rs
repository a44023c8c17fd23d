//! Universe provider trait definition.

use crate::error::UniverseError;
use crate::types::{Instrument, TradingUniverse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for universe providers.
///
/// Providers own all I/O needed to select the universe (reference databases,
/// historical downloads, clustering). They are only called during
/// initialisation and refresh, never on the per-event path.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Retrieve the full universe of instruments before filtering.
    async fn retrieve_full_universe(&mut self) -> Result<Vec<Instrument>, UniverseError>;

    /// Filter the full universe and cluster the survivors.
    ///
    /// # Arguments
    /// * `time` - Reference time for any historical lookback
    async fn filter_and_cluster(
        &mut self,
        time: DateTime<Utc>,
    ) -> Result<TradingUniverse, UniverseError>;

    /// Subscribe market data for one instrument.
    async fn subscribe(&mut self, instrument: &Instrument) -> Result<(), UniverseError>;

    /// Stop market data for an instrument that left the universe.
    async fn unsubscribe(&mut self, _instrument: &Instrument) -> Result<(), UniverseError> {
        Ok(())
    }

    /// Get the provider name.
    fn name(&self) -> &str;
}
