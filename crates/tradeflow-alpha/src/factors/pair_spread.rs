//! Pair spread factor.
//!
//! Tracks the hedge ratio between two USD price series with an online
//! Kalman filter and trades the normalized prediction error:
//! enter when the z-score crosses `±zscore_threshold`, exit when it crosses
//! zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tradeflow_core::error::SignalError;
use tradeflow_core::traits::{FactorComputation, FactorState};
use tradeflow_core::types::{InstrumentState, SignalVector};

use super::clock::QuoteClock;

/// Configuration for the pair spread factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairSpreadConfig {
    /// Kalman state noise as `delta` in `delta / (1 - delta)`
    pub learning_rate: f64,
    /// Measurement noise variance
    pub observation_covariance: f64,
    /// Z-score magnitude that opens a position
    pub zscore_threshold: f64,
    /// Observations forced flat while the filter converges
    pub burn_in: usize,
}

impl Default for PairSpreadConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-4,
            observation_covariance: 1e-3,
            zscore_threshold: 2.0,
            burn_in: 100,
        }
    }
}

impl PairSpreadConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), SignalError> {
        if !(self.learning_rate > 0.0 && self.learning_rate < 1.0) {
            return Err(SignalError::InvalidConfig(
                "learning_rate must be in (0, 1)".into(),
            ));
        }
        if self.observation_covariance <= 0.0 {
            return Err(SignalError::InvalidConfig(
                "observation_covariance must be positive".into(),
            ));
        }
        if self.zscore_threshold <= 0.0 {
            return Err(SignalError::InvalidConfig(
                "zscore_threshold must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Two-state Kalman filter regressing `y` on `[x, 1]`.
#[derive(Debug, Clone, Default)]
struct KalmanRegression {
    beta: [f64; 2],
    p: [[f64; 2]; 2],
    steps: usize,
}

impl KalmanRegression {
    /// Advance one observation, returning the prediction error and its variance.
    fn step(&mut self, x: f64, y: f64, delta: f64, ve: f64) -> (f64, f64) {
        let obs = [x, 1.0];
        let vw = delta / (1.0 - delta);

        // Prior covariance; zero on the first step
        let r = if self.steps == 0 {
            [[0.0; 2]; 2]
        } else {
            [
                [self.p[0][0] + vw, self.p[0][1]],
                [self.p[1][0], self.p[1][1] + vw],
            ]
        };

        let y_hat = obs[0] * self.beta[0] + obs[1] * self.beta[1];
        let error = y - y_hat;

        // x R
        let xr = [
            obs[0] * r[0][0] + obs[1] * r[1][0],
            obs[0] * r[0][1] + obs[1] * r[1][1],
        ];
        let variance = xr[0] * obs[0] + xr[1] * obs[1] + ve;

        // R x' / Q
        let gain = [
            (r[0][0] * obs[0] + r[0][1] * obs[1]) / variance,
            (r[1][0] * obs[0] + r[1][1] * obs[1]) / variance,
        ];

        self.beta[0] += gain[0] * error;
        self.beta[1] += gain[1] * error;

        for i in 0..2 {
            for j in 0..2 {
                self.p[i][j] = r[i][j] - gain[i] * xr[j];
            }
        }
        self.steps += 1;

        (error, variance)
    }
}

/// Kalman-filtered pair trading factor over `[first, second]`.
pub struct PairSpreadFactor {
    config: PairSpreadConfig,
    members: [String; 2],
    clock: QuoteClock,
    filter: KalmanRegression,
    long_units: f64,
    short_units: f64,
    last_zscore: Option<f64>,
}

impl PairSpreadFactor {
    /// Create a new pair spread factor.
    pub fn new(config: PairSpreadConfig, first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            config,
            members: [first.into(), second.into()],
            clock: QuoteClock::default(),
            filter: KalmanRegression::default(),
            long_units: 0.0,
            short_units: 0.0,
            last_zscore: None,
        }
    }

    /// Current hedge ratio of the second leg on the first.
    pub fn hedge_ratio(&self) -> f64 {
        self.filter.beta[0]
    }

    /// Net units of the spread held.
    pub fn position(&self) -> f64 {
        self.long_units + self.short_units
    }

    /// Step the filter once both legs are priced and a fresh quote arrived.
    fn step_on_fresh_quote(&mut self) {
        if !self.clock.has_fresh() {
            return;
        }
        let (Some(x), Some(y)) = (
            self.clock.price(&self.members[0]),
            self.clock.price(&self.members[1]),
        ) else {
            return;
        };

        let (error, variance) = self.filter.step(
            x,
            y,
            self.config.learning_rate,
            self.config.observation_covariance,
        );
        let zscore = error / variance.sqrt();
        self.last_zscore = Some(zscore);
        self.update_position(zscore);
        self.clock.consume();
    }

    fn update_position(&mut self, zscore: f64) {
        if self.filter.steps <= self.config.burn_in {
            self.long_units = 0.0;
            self.short_units = 0.0;
            return;
        }

        let threshold = self.config.zscore_threshold;
        if zscore < -threshold {
            self.long_units = 1.0;
        } else if zscore > 0.0 {
            self.long_units = 0.0;
        }
        if zscore > threshold {
            self.short_units = -1.0;
        } else if zscore < 0.0 {
            self.short_units = 0.0;
        }
    }
}

impl FactorComputation for PairSpreadFactor {
    fn name(&self) -> &str {
        "pair_spread"
    }

    fn receive_observation(&mut self, symbol: &str, observation: &InstrumentState) {
        if self.members.iter().any(|m| m == symbol) {
            self.clock.observe(symbol, observation);
        }
    }

    fn generate_signals(&mut self) -> SignalVector {
        self.step_on_fresh_quote();

        let position = self.position();
        let [first, second] = &self.members;
        let mut signals = SignalVector::new();
        signals.insert(first.clone(), -self.hedge_ratio().round() * position);
        signals.insert(second.clone(), position);
        signals
    }

    fn state(&self) -> FactorState {
        let mut indicators = HashMap::new();
        indicators.insert("hedge_ratio".to_string(), self.filter.beta[0]);
        indicators.insert("intercept".to_string(), self.filter.beta[1]);
        indicators.insert("position".to_string(), self.position());
        if let Some(z) = self.last_zscore {
            indicators.insert("zscore".to_string(), z);
        }

        FactorState {
            name: format!("pair_spread[{},{}]", self.members[0], self.members[1]),
            is_warmed_up: self.filter.steps > self.config.burn_in,
            observations: self.filter.steps,
            indicators,
        }
    }
}
