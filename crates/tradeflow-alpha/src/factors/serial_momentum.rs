//! Serial (time-series) momentum factor.
//!
//! Takes the sign of the return over the lookback window and holds it for a
//! fixed number of fresh observations.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tradeflow_core::error::SignalError;
use tradeflow_core::traits::{FactorComputation, FactorState};
use tradeflow_core::types::{InstrumentState, SignalVector};

use super::clock::QuoteClock;

/// Configuration for the serial momentum factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialMomentumConfig {
    /// Observations spanned by the return
    pub lookback: usize,
    /// Observations a position is held before re-evaluating
    pub holding_period: usize,
}

impl Default for SerialMomentumConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            holding_period: 10,
        }
    }
}

impl SerialMomentumConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.lookback == 0 {
            return Err(SignalError::InvalidConfig(
                "lookback must be greater than 0".into(),
            ));
        }
        if self.holding_period == 0 {
            return Err(SignalError::InvalidConfig(
                "holding_period must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Single-instrument momentum factor.
pub struct SerialMomentumFactor {
    config: SerialMomentumConfig,
    symbol: String,
    clock: QuoteClock,
    prices: VecDeque<f64>,
    direction: f64,
    held: usize,
    observations: usize,
}

impl SerialMomentumFactor {
    /// Create a new serial momentum factor.
    pub fn new(config: SerialMomentumConfig, symbol: impl Into<String>) -> Self {
        let capacity = config.lookback + 1;
        Self {
            config,
            symbol: symbol.into(),
            clock: QuoteClock::default(),
            prices: VecDeque::with_capacity(capacity),
            direction: 0.0,
            held: 0,
            observations: 0,
        }
    }

    /// Current direction: -1, 0 or 1.
    pub fn direction(&self) -> f64 {
        self.direction
    }

    fn lookback_return(&self) -> Option<f64> {
        if self.prices.len() <= self.config.lookback {
            return None;
        }
        let first = *self.prices.front()?;
        let last = *self.prices.back()?;
        if first == 0.0 {
            return None;
        }
        Some(last / first - 1.0)
    }

    fn step(&mut self, price: f64) {
        self.prices.push_back(price);
        while self.prices.len() > self.config.lookback + 1 {
            self.prices.pop_front();
        }
        self.observations += 1;

        if self.direction != 0.0 {
            self.held += 1;
            if self.held < self.config.holding_period {
                return;
            }
            self.direction = 0.0;
        }

        self.held = 0;
        if let Some(ret) = self.lookback_return() {
            self.direction = if ret > 0.0 {
                1.0
            } else if ret < 0.0 {
                -1.0
            } else {
                0.0
            };
        }
    }
}

impl FactorComputation for SerialMomentumFactor {
    fn name(&self) -> &str {
        "serial_momentum"
    }

    fn receive_observation(&mut self, symbol: &str, observation: &InstrumentState) {
        if symbol == self.symbol {
            self.clock.observe(symbol, observation);
        }
    }

    fn generate_signals(&mut self) -> SignalVector {
        if self.clock.has_fresh() {
            if let Some(price) = self.clock.price(&self.symbol) {
                self.step(price);
            }
            self.clock.consume();
        }

        let mut signals = SignalVector::new();
        signals.insert(self.symbol.clone(), self.direction);
        signals
    }

    fn state(&self) -> FactorState {
        let mut indicators = HashMap::new();
        indicators.insert("direction".to_string(), self.direction);
        if let Some(ret) = self.lookback_return() {
            indicators.insert("lookback_return".to_string(), ret);
        }

        FactorState {
            name: format!("serial_momentum[{}]", self.symbol),
            is_warmed_up: self.prices.len() > self.config.lookback,
            observations: self.observations,
            indicators,
        }
    }
}
