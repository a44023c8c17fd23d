//! Universe provider backed by configuration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use tradeflow_core::error::UniverseError;
use tradeflow_core::traits::UniverseProvider;
use tradeflow_core::types::{ClusterId, Instrument, TradingUniverse, BASE_CURRENCY};

fn default_currency() -> String {
    BASE_CURRENCY.to_string()
}

/// One configured instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    #[serde(default = "default_currency")]
    pub quote_currency: String,
}

impl InstrumentSpec {
    /// USD-quoted instrument.
    pub fn usd(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quote_currency: default_currency(),
        }
    }
}

/// Fixed universe description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticUniverseConfig {
    /// Instruments in the universe
    pub instruments: Vec<InstrumentSpec>,
    /// Clusters as ordered symbol lists; empty means one cluster of everything
    pub clusters: Vec<Vec<String>>,
    /// Instruments dropped by filtering
    pub excluded: Vec<String>,
}

/// Provider that serves a universe described in configuration.
///
/// Reference pairs for every non-USD quote currency are added
/// automatically.
pub struct StaticUniverseProvider {
    config: StaticUniverseConfig,
    subscribed: BTreeSet<String>,
}

impl StaticUniverseProvider {
    /// Create a new static provider.
    pub fn new(config: StaticUniverseConfig) -> Self {
        Self {
            config,
            subscribed: BTreeSet::new(),
        }
    }

    /// Symbols subscribed so far.
    pub fn subscribed(&self) -> &BTreeSet<String> {
        &self.subscribed
    }

    fn instruments(&self) -> Result<Vec<Instrument>, UniverseError> {
        let mut seen = BTreeSet::new();
        self.config
            .instruments
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                if !seen.insert(spec.symbol.as_str()) {
                    return Err(UniverseError::Retrieval(format!(
                        "duplicate instrument {}",
                        spec.symbol
                    )));
                }
                Ok(Instrument::new(spec.symbol.clone(), spec.quote_currency.clone(), i as u64))
            })
            .collect()
    }

    /// Apply exclusions, add reference pairs and build the clusters.
    ///
    /// Instrument ids are positions in the configured list; reference pairs
    /// are numbered after all configured instruments.
    pub fn build_universe(&self) -> Result<TradingUniverse, UniverseError> {
        let excluded: BTreeSet<&String> = self.config.excluded.iter().collect();
        let instruments: Vec<Instrument> = self
            .instruments()?
            .into_iter()
            .filter(|i| !excluded.contains(&i.symbol))
            .collect();

        if instruments.is_empty() {
            return Err(UniverseError::Empty);
        }

        let mut universe = TradingUniverse::new();
        let mut next_id = self.config.instruments.len() as u64;
        let mut references = BTreeMap::new();
        for instrument in &instruments {
            if let Some(pair) = instrument.reference_pair() {
                references.entry(pair).or_insert_with(|| {
                    let id = next_id;
                    next_id += 1;
                    id
                });
            }
        }
        for instrument in instruments {
            universe = universe.with_instrument(instrument);
        }
        for (pair, id) in references {
            universe = universe.with_reference(pair, id);
        }

        if self.config.clusters.is_empty() {
            let members = universe.symbols().cloned().collect();
            universe = universe.with_cluster(0, members);
        } else {
            for (id, members) in self.config.clusters.iter().enumerate() {
                let members: Vec<String> = members
                    .iter()
                    .filter(|s| universe.contains(s))
                    .cloned()
                    .collect();
                universe = universe.with_cluster(id as ClusterId, members);
            }
        }
        Ok(universe)
    }
}

#[async_trait]
impl UniverseProvider for StaticUniverseProvider {
    async fn retrieve_full_universe(&mut self) -> Result<Vec<Instrument>, UniverseError> {
        self.instruments()
    }

    async fn filter_and_cluster(
        &mut self,
        time: DateTime<Utc>,
    ) -> Result<TradingUniverse, UniverseError> {
        let universe = self.build_universe()?;
        info!(
            time = %time,
            instruments = universe.len(),
            clusters = universe.clusters.len(),
            references = universe.reference_currencies.len(),
            "Universe filtered and clustered"
        );
        Ok(universe)
    }

    async fn subscribe(&mut self, instrument: &Instrument) -> Result<(), UniverseError> {
        if !self.config.instruments.iter().any(|i| i.symbol == instrument.symbol) {
            return Err(UniverseError::Subscription {
                symbol: instrument.symbol.clone(),
                reason: "not a configured instrument".into(),
            });
        }
        debug!(symbol = %instrument.symbol, "Subscribed");
        self.subscribed.insert(instrument.symbol.clone());
        Ok(())
    }

    async fn unsubscribe(&mut self, instrument: &Instrument) -> Result<(), UniverseError> {
        if self.subscribed.remove(&instrument.symbol) {
            debug!(symbol = %instrument.symbol, "Unsubscribed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> StaticUniverseConfig {
        StaticUniverseConfig {
            instruments: vec![
                InstrumentSpec::usd("A"),
                InstrumentSpec::usd("B"),
                InstrumentSpec {
                    symbol: "SAP".into(),
                    quote_currency: "EUR".into(),
                },
            ],
            clusters: vec![vec!["B".into(), "A".into()], vec!["SAP".into(), "GONE".into()]],
            excluded: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_clusters_and_references() {
        let mut provider = StaticUniverseProvider::new(config());
        let universe = provider.filter_and_cluster(now()).await.unwrap();

        assert_eq!(universe.len(), 3);
        assert_eq!(universe.clusters[&0], vec!["B".to_string(), "A".to_string()]);
        assert_eq!(universe.clusters[&1], vec!["SAP".to_string()]);
        assert!(universe.is_reference("EURUSD"));
    }

    #[tokio::test]
    async fn test_default_single_cluster_and_exclusion() {
        let mut config = config();
        config.clusters.clear();
        config.excluded = vec!["SAP".into()];
        let mut provider = StaticUniverseProvider::new(config);

        assert_eq!(provider.retrieve_full_universe().await.unwrap().len(), 3);
        let universe = provider.filter_and_cluster(now()).await.unwrap();
        assert_eq!(universe.clusters[&0], vec!["A".to_string(), "B".to_string()]);
        assert!(universe.reference_currencies.is_empty());
    }

    #[tokio::test]
    async fn test_empty_universe_is_error() {
        let mut provider = StaticUniverseProvider::new(StaticUniverseConfig::default());
        assert!(matches!(
            provider.filter_and_cluster(now()).await,
            Err(UniverseError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_reference_ids_do_not_collide_with_instruments() {
        let mut config = config();
        config.excluded = vec!["A".into()];
        let provider = StaticUniverseProvider::new(config);

        let universe = provider.build_universe().unwrap();
        let ids: BTreeSet<u64> = universe.instruments.values().map(|i| i.id).collect();
        assert_eq!(ids, BTreeSet::from([1, 2]));
        assert_eq!(universe.reference_currencies["EURUSD"], 3);
    }

    #[tokio::test]
    async fn test_duplicates_and_foreign_subscriptions_are_errors() {
        let mut config = config();
        config.instruments.push(InstrumentSpec::usd("A"));
        let mut provider = StaticUniverseProvider::new(config);
        assert!(matches!(
            provider.retrieve_full_universe().await,
            Err(UniverseError::Retrieval(_))
        ));

        let mut provider = StaticUniverseProvider::new(self::config());
        let foreign = Instrument::new("QQQ", "USD", 9);
        assert!(matches!(
            provider.subscribe(&foreign).await,
            Err(UniverseError::Subscription { .. })
        ));

        let a = Instrument::new("A", "USD", 0);
        provider.subscribe(&a).await.unwrap();
        assert!(provider.subscribed().contains("A"));
        provider.unsubscribe(&a).await.unwrap();
        assert!(provider.subscribed().is_empty());
    }
}
