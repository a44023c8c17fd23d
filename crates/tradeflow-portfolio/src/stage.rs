//! The portfolio stage.

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tradeflow_core::error::{PipelineResult, PortfolioError};
use tradeflow_core::traits::{RiskOptimizer, SnapshotConsumer, UniverseConsumer};
use tradeflow_core::types::{
    MarketSnapshot, OrderVector, SignalVector, TargetPortfolio, TradingUniverse, Weights,
};

use crate::optimizer::OptimizerSettings;

/// How signals are scaled into weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Divide by the largest signal value
    #[default]
    MaxValue,
    /// Divide by the largest absolute signal value
    MaxAbsolute,
}

/// Leverage of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentLeverage {
    pub symbol: String,
    pub leverage: f64,
}

/// Portfolio stage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Capital the targets are sized to
    pub firm_equity: Decimal,
    /// Leverage for instruments without their own entry
    pub default_leverage: f64,
    /// Per-instrument leverage
    pub leverage: Vec<InstrumentLeverage>,
    pub normalization: NormalizationPolicy,
    pub optimizer: OptimizerSettings,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            firm_equity: dec!(100000),
            default_leverage: 1.0,
            leverage: Vec::new(),
            normalization: NormalizationPolicy::default(),
            optimizer: OptimizerSettings::default(),
        }
    }
}

impl PortfolioConfig {
    /// Leverage applied to an instrument.
    pub fn leverage_for(&self, symbol: &str) -> f64 {
        self.leverage
            .iter()
            .find(|l| l.symbol == symbol)
            .map(|l| l.leverage)
            .unwrap_or(self.default_leverage)
    }
}

/// Owns the previous target portfolio.
pub struct PortfolioStage {
    config: PortfolioConfig,
    optimizer: Box<dyn RiskOptimizer>,
    universe: Arc<TradingUniverse>,
    snapshot: Option<MarketSnapshot>,
    previous: TargetPortfolio,
}

impl PortfolioStage {
    /// Create a new portfolio stage with the configured optimizer.
    pub fn new(config: PortfolioConfig) -> Self {
        let optimizer = config.optimizer.build();
        Self::with_optimizer(config, optimizer)
    }

    /// Create a new portfolio stage with a custom optimizer.
    pub fn with_optimizer(config: PortfolioConfig, optimizer: Box<dyn RiskOptimizer>) -> Self {
        Self {
            config,
            optimizer,
            universe: Arc::new(TradingUniverse::default()),
            snapshot: None,
            previous: TargetPortfolio::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    /// Targets committed by the last diff.
    pub fn previous_target(&self) -> &TargetPortfolio {
        &self.previous
    }

    /// Divide signals by the normalization divisor.
    pub fn try_normalize(&self, signal: &SignalVector) -> Result<Weights, PortfolioError> {
        if signal.is_empty() {
            return Ok(Weights::new());
        }

        let divisor = match self.config.normalization {
            NormalizationPolicy::MaxValue => {
                signal.values().copied().fold(f64::NEG_INFINITY, f64::max)
            }
            NormalizationPolicy::MaxAbsolute => {
                signal.values().map(|v| v.abs()).fold(0.0, f64::max)
            }
        };
        if divisor == 0.0 || !divisor.is_finite() {
            return Err(PortfolioError::DivisionByZero {
                stage: "normalizing signals",
            });
        }

        Ok(signal
            .iter()
            .map(|(symbol, value)| (symbol.clone(), value / divisor))
            .collect())
    }

    /// Normalize, falling back to all-zero weights on a zero divisor.
    pub fn normalize(&self, signal: &SignalVector) -> Weights {
        match self.try_normalize(signal) {
            Ok(weights) => weights,
            Err(e) => {
                debug!(error = %e, "Degenerate signal, using zero weights");
                signal.keys().map(|s| (s.clone(), 0.0)).collect()
            }
        }
    }

    /// Apply the risk optimizer.
    pub fn optimize(&self, weights: &Weights) -> Weights {
        self.optimizer.optimize(weights)
    }

    /// Size weights to firm equity.
    ///
    /// The unit market value is `Σ |w|·usd_price·leverage` over non-zero
    /// weights; each target is `round(w · firm_equity / unit_value)`.
    pub fn try_scale_by_equity(&self, weights: &Weights) -> Result<TargetPortfolio, PortfolioError> {
        let mut unit_value = 0.0;
        for (symbol, weight) in weights.iter().filter(|(_, w)| **w != 0.0) {
            let price = self
                .snapshot
                .as_ref()
                .and_then(|s| s.usd_price(symbol))
                .ok_or_else(|| PortfolioError::InsufficientData {
                    symbol: symbol.clone(),
                })?;
            unit_value += weight.abs() * price * self.config.leverage_for(symbol);
        }

        if unit_value == 0.0 || !unit_value.is_finite() {
            return Err(PortfolioError::DivisionByZero {
                stage: "scaling by equity",
            });
        }

        let equity = self.config.firm_equity.to_f64().unwrap_or(0.0);
        let multiplier = equity / unit_value;

        Ok(weights
            .iter()
            .map(|(symbol, weight)| (symbol.clone(), (weight * multiplier).round() as i64))
            .collect())
    }

    /// Size weights to firm equity with the fallback policies applied.
    ///
    /// A zero unit value yields all-zero targets. A non-zero weight without
    /// a USD price holds the previous targets so no orders are produced.
    pub fn scale_by_equity(&self, weights: &Weights) -> TargetPortfolio {
        match self.try_scale_by_equity(weights) {
            Ok(targets) => targets,
            Err(PortfolioError::InsufficientData { symbol }) => {
                warn!(symbol = %symbol, "No USD price, holding previous targets");
                weights
                    .keys()
                    .map(|s| (s.clone(), self.previous.get(s).copied().unwrap_or(0)))
                    .collect()
            }
            Err(e) => {
                debug!(error = %e, "Zero unit market value, using zero targets");
                weights.keys().map(|s| (s.clone(), 0)).collect()
            }
        }
    }

    /// Run normalize, optimize and scale in sequence.
    pub fn create_portfolio(&self, signal: &SignalVector) -> TargetPortfolio {
        let weights = self.normalize(signal);
        let weights = self.optimize(&weights);
        self.scale_by_equity(&weights)
    }

    /// Orders needed to move from the previous targets to `targets`.
    ///
    /// Covers every active instrument, treating missing entries as zero,
    /// and commits `targets` as the new previous.
    pub fn diff_against_previous(&mut self, targets: &TargetPortfolio) -> OrderVector {
        let mut orders = OrderVector::new();
        let mut committed = TargetPortfolio::new();

        for symbol in self.universe.symbols() {
            let target = targets.get(symbol).copied().unwrap_or(0);
            let previous = self.previous.get(symbol).copied().unwrap_or(0);
            orders.insert(symbol.clone(), target - previous);
            committed.insert(symbol.clone(), target);
        }

        debug!(
            changes = orders.values().filter(|q| **q != 0).count(),
            "Diffed targets against previous"
        );
        self.previous = committed;
        orders
    }
}

impl UniverseConsumer for PortfolioStage {
    fn receive_universe(&mut self, universe: Arc<TradingUniverse>) {
        self.universe = universe;
    }

    fn initialise(&mut self) -> PipelineResult<()> {
        let universe = Arc::clone(&self.universe);
        self.previous.retain(|symbol, target| {
            let keep = universe.contains(symbol);
            if !keep && *target != 0 {
                warn!(symbol = %symbol, target = *target, "Instrument left the universe with an open target");
            }
            keep
        });
        for symbol in universe.symbols() {
            self.previous.entry(symbol.clone()).or_insert(0);
        }

        info!(
            instruments = universe.len(),
            equity = %self.config.firm_equity,
            optimizer = self.optimizer.name(),
            "Portfolio stage initialised"
        );
        Ok(())
    }
}

impl SnapshotConsumer for PortfolioStage {
    fn receive_snapshot(&mut self, snapshot: MarketSnapshot) {
        self.snapshot = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::MaxWeightOptimizer;
    use chrono::{TimeZone, Utc};
    use tradeflow_core::types::{Instrument, ObservedState, Quote};

    fn universe(symbols: &[&str]) -> Arc<TradingUniverse> {
        Arc::new(
            symbols
                .iter()
                .enumerate()
                .fold(TradingUniverse::new(), |u, (i, s)| {
                    u.with_instrument(Instrument::new(*s, "USD", i as u64))
                }),
        )
    }

    fn snapshot(universe: &TradingUniverse, prices: &[(&str, f64)]) -> MarketSnapshot {
        let mut state = ObservedState::new();
        state.initialise(universe);
        let time = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        for (symbol, price) in prices {
            let entry = state.instrument_mut(symbol).unwrap();
            entry.latest_quote = Some(Quote::new(*symbol, time, *price, *price));
            entry.usd_price = Some(*price);
        }
        state.snapshot()
    }

    fn stage(symbols: &[&str], prices: &[(&str, f64)]) -> PortfolioStage {
        let universe = universe(symbols);
        let mut stage = PortfolioStage::new(PortfolioConfig::default());
        stage.receive_universe(universe.clone());
        stage.initialise().unwrap();
        stage.receive_snapshot(snapshot(&universe, prices));
        stage
    }

    fn vector<T: Copy>(entries: &[(&str, T)]) -> std::collections::BTreeMap<String, T> {
        entries.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn test_normalize_by_max_value() {
        let stage = stage(&["A", "B"], &[]);
        let weights = stage.try_normalize(&vector(&[("A", 2.0), ("B", 1.0)])).unwrap();
        assert_eq!(weights, vector(&[("A", 1.0), ("B", 0.5)]));
    }

    #[test]
    fn test_normalize_all_zero_falls_back() {
        let stage = stage(&["A", "B"], &[]);
        let signal = vector(&[("A", 0.0), ("B", 0.0)]);

        assert!(matches!(
            stage.try_normalize(&signal),
            Err(PortfolioError::DivisionByZero { .. })
        ));
        assert_eq!(stage.normalize(&signal), vector(&[("A", 0.0), ("B", 0.0)]));
    }

    #[test]
    fn test_normalize_max_absolute() {
        let mut stage = stage(&["A", "B"], &[]);
        stage.config.normalization = NormalizationPolicy::MaxAbsolute;

        let weights = stage.normalize(&vector(&[("A", -4.0), ("B", 2.0)]));
        assert_eq!(weights, vector(&[("A", -1.0), ("B", 0.5)]));
    }

    #[test]
    fn test_scale_matches_worked_example() {
        let stage = stage(&["A", "B"], &[("A", 10.0), ("B", 20.0)]);
        let targets = stage
            .try_scale_by_equity(&vector(&[("A", 1.0), ("B", 0.5)]))
            .unwrap();
        assert_eq!(targets, vector(&[("A", 5000), ("B", 2500)]));
    }

    #[test]
    fn test_scale_applies_leverage_and_rounds_half_away() {
        let mut stage = stage(&["A", "B"], &[("A", 20.0), ("B", 10.0)]);
        stage.config.leverage.push(InstrumentLeverage {
            symbol: "B".to_string(),
            leverage: 2.0,
        });
        stage.config.firm_equity = dec!(100);

        // unit value 0.5·20 + 0.5·10·2 = 20, multiplier 5
        let targets = stage
            .try_scale_by_equity(&vector(&[("A", -0.5), ("B", 0.5)]))
            .unwrap();
        assert_eq!(targets, vector(&[("A", -3), ("B", 3)]));
    }

    #[test]
    fn test_scale_degenerate_and_insufficient() {
        let stage = stage(&["A", "B"], &[("A", 10.0)]);

        let zero = vector(&[("A", 0.0), ("B", 0.0)]);
        assert!(matches!(
            stage.try_scale_by_equity(&zero),
            Err(PortfolioError::DivisionByZero { .. })
        ));
        assert_eq!(stage.scale_by_equity(&zero), vector(&[("A", 0), ("B", 0)]));

        let missing = vector(&[("A", 1.0), ("B", 1.0)]);
        assert!(matches!(
            stage.try_scale_by_equity(&missing),
            Err(PortfolioError::InsufficientData { symbol }) if symbol == "B"
        ));
    }

    #[test]
    fn test_insufficient_data_holds_previous() {
        let mut stage = stage(&["A", "B"], &[("A", 10.0), ("B", 20.0)]);
        let first = stage.create_portfolio(&vector(&[("A", 1.0), ("B", 0.5)]));
        stage.diff_against_previous(&first);

        let universe = universe(&["A", "B"]);
        stage.receive_snapshot(snapshot(&universe, &[("A", 10.0)]));
        let held = stage.create_portfolio(&vector(&[("A", 1.0), ("B", 1.0)]));
        let orders = stage.diff_against_previous(&held);

        assert!(orders.values().all(|q| *q == 0));
        assert_eq!(stage.previous_target(), &first);
    }

    #[test]
    fn test_diff_fills_active_instruments() {
        let mut stage = stage(&["A", "B", "C"], &[]);

        let orders = stage.diff_against_previous(&vector(&[("A", 100)]));
        assert_eq!(orders, vector(&[("A", 100), ("B", 0), ("C", 0)]));

        let orders = stage.diff_against_previous(&vector(&[("A", 40), ("C", -5)]));
        assert_eq!(orders, vector(&[("A", -60), ("B", 0), ("C", -5)]));
        assert_eq!(stage.previous_target(), &vector(&[("A", 40), ("B", 0), ("C", -5)]));
    }

    #[test]
    fn test_orders_sum_to_target() {
        let mut stage = stage(&["A", "B"], &[]);
        let targets = [
            vector(&[("A", 10), ("B", -3)]),
            vector(&[("A", 7), ("B", 0)]),
            vector(&[("A", -2), ("B", 9)]),
        ];

        let mut position = vector(&[("A", 0i64), ("B", 0)]);
        for target in &targets {
            for (symbol, qty) in stage.diff_against_previous(target) {
                *position.get_mut(&symbol).unwrap() += qty;
            }
            assert_eq!(&position, target);
        }
    }

    #[test]
    fn test_custom_optimizer_in_pipeline() {
        let universe = universe(&["A", "B"]);
        let mut stage = PortfolioStage::with_optimizer(
            PortfolioConfig::default(),
            Box::new(MaxWeightOptimizer::new(0.25)),
        );
        stage.receive_universe(universe.clone());
        stage.initialise().unwrap();
        stage.receive_snapshot(snapshot(&universe, &[("A", 10.0), ("B", 10.0)]));

        // weights {1, 0.5} clipped to {0.25, 0.25}: unit value 5
        let targets = stage.create_portfolio(&vector(&[("A", 2.0), ("B", 1.0)]));
        assert_eq!(targets, vector(&[("A", 5000), ("B", 5000)]));
    }

    #[test]
    fn test_refresh_drops_departed_targets() {
        let mut stage = stage(&["A", "B"], &[]);
        stage.diff_against_previous(&vector(&[("A", 5), ("B", 7)]));

        stage.receive_universe(universe(&["A", "C"]));
        stage.initialise().unwrap();

        assert_eq!(stage.previous_target(), &vector(&[("A", 5), ("C", 0)]));
    }
}
