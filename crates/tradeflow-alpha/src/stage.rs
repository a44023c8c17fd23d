//! The signal stage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use tradeflow_core::error::{PipelineResult, SignalError};
use tradeflow_core::traits::{FactorComputation, FactorState, SnapshotConsumer, UniverseConsumer};
use tradeflow_core::types::{MarketSnapshot, SignalVector, TradingUniverse};

use crate::catalog::FactorCatalog;
use crate::derivation::DerivationRule;

/// Identity of a factor instance: its kind plus its ordered universe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactorKey {
    kind: String,
    universe: Vec<String>,
}

impl FactorKey {
    /// Create a new factor key.
    pub fn new(kind: impl Into<String>, universe: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            universe,
        }
    }

    /// Factor kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Ordered member instruments.
    pub fn universe(&self) -> &[String] {
        &self.universe
    }
}

impl fmt::Display for FactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.universe.join(","))
    }
}

/// One configured factor kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    /// Catalog kind
    pub kind: String,
    /// Factor parameters; `null` for the catalog defaults
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    /// Overrides the kind's default derivation rule
    #[serde(default)]
    pub derivation: Option<DerivationRule>,
}

impl FactorSpec {
    /// Spec with default parameters.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: serde_json::Value::Null,
            derivation: None,
        }
    }
}

/// Signal stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaConfig {
    pub factors: Vec<FactorSpec>,
}

impl Default for AlphaConfig {
    fn default() -> Self {
        Self {
            factors: vec![FactorSpec::new("pair_spread")],
        }
    }
}

impl AlphaConfig {
    /// Factor keys derived over `universe`, with the parameters of the spec
    /// that produced each.
    fn derive_keys<'a>(
        &'a self,
        catalog: &FactorCatalog,
        universe: &TradingUniverse,
    ) -> Result<Vec<(FactorKey, &'a serde_json::Value)>, SignalError> {
        let mut wanted = Vec::new();
        for spec in &self.factors {
            let info = catalog
                .get(&spec.kind)
                .ok_or_else(|| SignalError::UnknownFactor(spec.kind.clone()))?;
            let rule = spec.derivation.unwrap_or(info.default_derivation);
            for members in rule.derive(universe) {
                wanted.push((FactorKey::new(spec.kind.clone(), members), &spec.params));
            }
        }
        Ok(wanted)
    }

    /// Build every factor this configuration derives over `universe`.
    ///
    /// Returns the number of factor instances; nothing is kept.
    pub fn check_against(&self, universe: &TradingUniverse) -> Result<usize, SignalError> {
        let catalog = FactorCatalog::new();
        let wanted = self.derive_keys(&catalog, universe)?;
        for (key, params) in &wanted {
            catalog.create(&key.kind, params, &key.universe)?;
        }
        Ok(wanted.len())
    }
}

/// Owns the factor instances and aggregates their output.
pub struct SignalStage {
    config: AlphaConfig,
    catalog: FactorCatalog,
    universe: Arc<TradingUniverse>,
    snapshot: Option<MarketSnapshot>,
    factors: BTreeMap<FactorKey, Box<dyn FactorComputation>>,
    registered: BTreeSet<FactorKey>,
    last_signal: Option<SignalVector>,
}

impl SignalStage {
    /// Create a new signal stage.
    pub fn new(config: AlphaConfig) -> Self {
        Self {
            config,
            catalog: FactorCatalog::new(),
            universe: Arc::new(TradingUniverse::default()),
            snapshot: None,
            factors: BTreeMap::new(),
            registered: BTreeSet::new(),
            last_signal: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AlphaConfig {
        &self.config
    }

    /// Register a factor under a key outside the configured kinds.
    ///
    /// It survives universe refreshes as long as all its members stay active.
    pub fn register(&mut self, key: FactorKey, factor: Box<dyn FactorComputation>) {
        self.registered.insert(key.clone());
        self.factors.insert(key, factor);
    }

    /// Keys of the live factor instances.
    pub fn factor_keys(&self) -> impl Iterator<Item = &FactorKey> {
        self.factors.keys()
    }

    /// Number of live factor instances.
    pub fn factor_count(&self) -> usize {
        self.factors.len()
    }

    /// Monitoring state of every factor.
    pub fn factor_states(&self) -> Vec<(FactorKey, FactorState)> {
        self.factors
            .iter()
            .map(|(key, factor)| (key.clone(), factor.state()))
            .collect()
    }

    /// Build one factor per derived factor universe.
    ///
    /// Factors whose key is still derived keep their state; the rest are
    /// dropped and new keys get fresh instances. New instances are built
    /// before anything is dropped, so a failure leaves the registry as it was.
    pub fn initialise_factor_models(&mut self) -> Result<(), SignalError> {
        let wanted = self.config.derive_keys(&self.catalog, &self.universe)?;

        let mut fresh: BTreeMap<FactorKey, Box<dyn FactorComputation>> = BTreeMap::new();
        for (key, params) in &wanted {
            if self.factors.contains_key(key) || fresh.contains_key(key) {
                continue;
            }
            let factor = self.catalog.create(&key.kind, params, &key.universe)?;
            fresh.insert(key.clone(), factor);
        }

        let universe = &self.universe;
        self.registered
            .retain(|key| key.universe.iter().all(|s| universe.contains(s)));
        let keep: BTreeSet<&FactorKey> = wanted
            .iter()
            .map(|(key, _)| key)
            .chain(self.registered.iter())
            .collect();
        let before = self.factors.len();
        self.factors.retain(|key, _| keep.contains(key));
        let retained = self.factors.len();
        let dropped = before - retained;
        let created = fresh.len();
        self.factors.extend(fresh);

        info!(
            factors = self.factors.len(),
            retained, created, dropped, "Factor models initialised"
        );
        Ok(())
    }

    /// Feed every factor the latest state of each active member.
    pub fn update_all(&mut self) {
        let Some(snapshot) = self.snapshot.as_ref() else {
            debug!("No snapshot yet, skipping factor update");
            return;
        };

        for (key, factor) in self.factors.iter_mut() {
            for symbol in &key.universe {
                if let Some(state) = snapshot.instrument(symbol) {
                    factor.receive_observation(symbol, state);
                }
            }
        }
    }

    /// Sum factor outputs into one signal per active instrument.
    pub fn aggregate(&mut self) {
        let mut signal: SignalVector = self
            .universe
            .symbols()
            .map(|s| (s.clone(), 0.0))
            .collect();

        for factor in self.factors.values_mut() {
            for (symbol, value) in factor.generate_signals() {
                if let Some(total) = signal.get_mut(&symbol) {
                    *total += value;
                }
            }
        }

        debug!(
            instruments = signal.len(),
            active = signal.values().filter(|v| **v != 0.0).count(),
            "Aggregated signals"
        );
        self.last_signal = Some(signal);
    }

    /// The most recent aggregation.
    pub fn emit(&self) -> Result<SignalVector, SignalError> {
        self.last_signal.clone().ok_or(SignalError::NotAggregated)
    }
}

impl UniverseConsumer for SignalStage {
    fn receive_universe(&mut self, universe: Arc<TradingUniverse>) {
        self.universe = universe;
    }

    fn initialise(&mut self) -> PipelineResult<()> {
        self.initialise_factor_models()?;
        self.last_signal = None;
        Ok(())
    }
}

impl SnapshotConsumer for SignalStage {
    fn receive_snapshot(&mut self, snapshot: MarketSnapshot) {
        self.snapshot = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_core::types::{Instrument, InstrumentState, ObservedState};

    /// Emits a fixed direction per member and counts observations.
    struct Scripted {
        members: Vec<String>,
        direction: f64,
        seen: Vec<String>,
    }

    impl Scripted {
        fn boxed(members: &[&str], direction: f64) -> Box<dyn FactorComputation> {
            Box::new(Self {
                members: members.iter().map(|s| s.to_string()).collect(),
                direction,
                seen: Vec::new(),
            })
        }
    }

    impl FactorComputation for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn receive_observation(&mut self, symbol: &str, _observation: &InstrumentState) {
            self.seen.push(symbol.to_string());
        }

        fn generate_signals(&mut self) -> SignalVector {
            self.members
                .iter()
                .map(|s| (s.clone(), self.direction))
                .collect()
        }

        fn state(&self) -> FactorState {
            FactorState {
                name: "scripted".into(),
                observations: self.seen.len(),
                ..Default::default()
            }
        }
    }

    fn universe(symbols: &[&str]) -> Arc<TradingUniverse> {
        let u = symbols
            .iter()
            .enumerate()
            .fold(TradingUniverse::new(), |u, (i, s)| {
                u.with_instrument(Instrument::new(*s, "USD", i as u64))
            });
        let members = symbols.iter().map(|s| s.to_string()).collect();
        Arc::new(u.with_cluster(0, members))
    }

    fn stage(config: AlphaConfig, symbols: &[&str]) -> SignalStage {
        let mut stage = SignalStage::new(config);
        stage.receive_universe(universe(symbols));
        stage.initialise().unwrap();
        stage
    }

    fn snapshot(universe: &TradingUniverse) -> MarketSnapshot {
        let mut state = ObservedState::new();
        state.initialise(universe);
        state.snapshot()
    }

    #[test]
    fn test_emit_before_aggregate() {
        let stage = stage(AlphaConfig { factors: vec![] }, &["A"]);
        assert!(matches!(stage.emit(), Err(SignalError::NotAggregated)));
    }

    #[test]
    fn test_pair_derivation_counts() {
        let stage = stage(AlphaConfig::default(), &["A", "B", "C"]);

        let keys: Vec<String> = stage.factor_keys().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec!["pair_spread[A,B]", "pair_spread[A,C]", "pair_spread[B,C]"]
        );
    }

    #[test]
    fn test_aggregate_sums_overlapping_factors() {
        let mut stage = stage(AlphaConfig { factors: vec![] }, &["A", "B", "C"]);
        stage.register(FactorKey::new("scripted", vec!["A".into(), "B".into()]), Scripted::boxed(&["A", "B"], 1.0));
        stage.register(FactorKey::new("scripted", vec!["B".into()]), Scripted::boxed(&["B"], -3.0));
        stage.register(FactorKey::new("scripted", vec!["A".into(), "Z".into()]), Scripted::boxed(&["A", "Z"], 0.5));

        stage.aggregate();
        let signal = stage.emit().unwrap();

        assert_eq!(signal.len(), 3);
        assert_eq!(signal["A"], 1.5);
        assert_eq!(signal["B"], -2.0);
        assert_eq!(signal["C"], 0.0);
        assert!(!signal.contains_key("Z"));
    }

    #[test]
    fn test_update_all_skips_inactive_members() {
        let universe = universe(&["A", "B"]);
        let mut stage = SignalStage::new(AlphaConfig { factors: vec![] });
        stage.receive_universe(universe.clone());
        stage.initialise().unwrap();
        stage.register(FactorKey::new("scripted", vec!["A".into(), "Q".into()]), Scripted::boxed(&["A"], 1.0));

        stage.update_all();
        assert_eq!(stage.factor_states()[0].1.observations, 0);

        stage.receive_snapshot(snapshot(&universe));
        stage.update_all();
        stage.update_all();
        assert_eq!(stage.factor_states()[0].1.observations, 2);
    }

    #[test]
    fn test_reinitialise_keeps_surviving_keys() {
        let config = AlphaConfig {
            factors: vec![FactorSpec {
                kind: "serial_momentum".into(),
                params: serde_json::json!({ "lookback": 2, "holding_period": 1 }),
                derivation: None,
            }],
        };
        let mut stage = stage(config, &["A", "B"]);
        assert_eq!(stage.factor_count(), 2);
        stage.register(FactorKey::new("scripted", vec!["B".into()]), Scripted::boxed(&["B"], 1.0));

        stage.receive_universe(universe(&["A", "C"]));
        stage.initialise().unwrap();

        let keys: Vec<String> = stage.factor_keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["serial_momentum[A]", "serial_momentum[C]"]);
    }

    #[test]
    fn test_unknown_factor_kind_fails_initialise() {
        let mut stage = SignalStage::new(AlphaConfig {
            factors: vec![FactorSpec::new("astrology")],
        });
        stage.receive_universe(universe(&["A"]));
        assert!(stage.initialise().is_err());
    }

    #[test]
    fn test_failed_reinitialise_leaves_factors_untouched() {
        let mut stage = stage(AlphaConfig::default(), &["A", "B"]);
        stage.config.factors[0].derivation = Some(DerivationRule::EachInstrument);

        stage.receive_universe(universe(&["A", "B", "C"]));
        assert!(stage.initialise().is_err());

        let keys: Vec<String> = stage.factor_keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["pair_spread[A,B]"]);
    }

    #[test]
    fn test_check_against_builds_every_factor() {
        let universe = universe(&["A", "B", "C"]);
        assert_eq!(AlphaConfig::default().check_against(&universe).unwrap(), 3);

        let mut wrong_rule = AlphaConfig::default();
        wrong_rule.factors[0].derivation = Some(DerivationRule::EachInstrument);
        assert!(matches!(
            wrong_rule.check_against(&universe),
            Err(SignalError::InvalidConfig(_))
        ));

        let bad_params = AlphaConfig {
            factors: vec![FactorSpec {
                kind: "serial_momentum".into(),
                params: serde_json::json!({ "lookback": 0, "holding_period": 1 }),
                derivation: None,
            }],
        };
        assert!(bad_params.check_against(&universe).is_err());
    }

    #[test]
    fn test_default_params_are_not_rendered() {
        let rendered = serde_json::to_value(FactorSpec::new("pair_spread")).unwrap();
        assert_eq!(rendered, serde_json::json!({ "kind": "pair_spread", "derivation": null }));
    }
}
