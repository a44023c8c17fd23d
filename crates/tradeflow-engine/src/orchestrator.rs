//! Pipeline orchestrator.

use chrono::{DateTime, Duration, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tradeflow_alpha::SignalStage;
use tradeflow_core::error::{PipelineError, PipelineResult, UniverseError};
use tradeflow_core::traits::{SnapshotConsumer, UniverseConsumer, UniverseProvider};
use tradeflow_core::types::{MarketEvent, TradingUniverse};
use tradeflow_data::DataStage;
use tradeflow_execution::ExecutionStage;
use tradeflow_portfolio::PortfolioStage;
use uuid::Uuid;

use crate::state::{PipelineState, PipelineStats};

/// Orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Event-time interval between universe refreshes; `None` disables them
    pub refresh_interval_secs: Option<u64>,
    /// Stop `run` on the first dispatch failure instead of replaying
    pub halt_on_dispatch_failure: bool,
}

/// What happened to one market event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Failed validation; no pipeline pass ran
    Dropped,
    /// A full pass ran; carries the id of the order dispatched, if any
    Processed { dispatched: Option<Uuid> },
}

/// Drives events through the four stages in a fixed order.
pub struct Orchestrator {
    config: EngineConfig,
    state: PipelineState,
    provider: Box<dyn UniverseProvider>,
    universe: Arc<TradingUniverse>,
    data: DataStage,
    signals: SignalStage,
    portfolio: PortfolioStage,
    execution: ExecutionStage,
    stats: PipelineStats,
    last_refresh: Option<DateTime<Utc>>,
}

impl Orchestrator {
    /// Create a new orchestrator in the `Uninitialized` state.
    pub fn new(
        config: EngineConfig,
        provider: Box<dyn UniverseProvider>,
        data: DataStage,
        signals: SignalStage,
        portfolio: PortfolioStage,
        execution: ExecutionStage,
    ) -> Self {
        Self {
            config,
            state: PipelineState::Uninitialized,
            provider,
            universe: Arc::new(TradingUniverse::default()),
            data,
            signals,
            portfolio,
            execution,
            stats: PipelineStats::default(),
            last_refresh: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Active universe.
    pub fn universe(&self) -> &TradingUniverse {
        &self.universe
    }

    /// Counters.
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// The data stage.
    pub fn data(&self) -> &DataStage {
        &self.data
    }

    /// The signal stage.
    pub fn signals(&self) -> &SignalStage {
        &self.signals
    }

    /// The portfolio stage.
    pub fn portfolio(&self) -> &PortfolioStage {
        &self.portfolio
    }

    /// The execution stage.
    pub fn execution(&self) -> &ExecutionStage {
        &self.execution
    }

    fn require(&self, expected: PipelineState) -> PipelineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    /// Load the universe and initialise every stage.
    ///
    /// `Uninitialized -> UniverseReady`.
    pub async fn initialise(&mut self, time: DateTime<Utc>) -> PipelineResult<()> {
        self.require(PipelineState::Uninitialized)?;
        self.load_universe(time).await?;
        self.state = PipelineState::UniverseReady;
        info!(
            provider = self.provider.name(),
            instruments = self.universe.len(),
            "Pipeline initialised"
        );
        Ok(())
    }

    /// Begin accepting events.
    ///
    /// `UniverseReady -> Running`.
    pub fn start(&mut self) -> PipelineResult<()> {
        self.require(PipelineState::UniverseReady)?;
        self.state = PipelineState::Running;
        info!("Pipeline running");
        Ok(())
    }

    /// Re-run universe selection and re-initialise the stages.
    ///
    /// Runs between events; surviving instruments keep their state and the
    /// pending order queue is untouched.
    pub async fn refresh_universe(&mut self, time: DateTime<Utc>) -> PipelineResult<()> {
        if self.state == PipelineState::Uninitialized {
            return Err(PipelineError::InvalidState {
                expected: PipelineState::UniverseReady.as_str(),
                actual: self.state.as_str(),
            });
        }
        self.load_universe(time).await?;
        self.stats.refreshes += 1;
        info!(
            instruments = self.universe.len(),
            pending_orders = self.execution.pending_len(),
            "Universe refreshed"
        );
        Ok(())
    }

    async fn load_universe(&mut self, time: DateTime<Utc>) -> PipelineResult<()> {
        let full = self.provider.retrieve_full_universe().await?;
        debug!(candidates = full.len(), "Retrieved full universe");

        let universe = self.provider.filter_and_cluster(time).await?;
        if universe.is_empty() {
            return Err(UniverseError::Empty.into());
        }
        for instrument in universe.instruments.values() {
            self.provider.subscribe(instrument).await?;
        }
        for instrument in self.universe.instruments.values() {
            if !universe.contains(&instrument.symbol) {
                self.provider.unsubscribe(instrument).await?;
            }
        }

        let universe = Arc::new(universe);
        self.data.receive_universe(Arc::clone(&universe));
        self.signals.receive_universe(Arc::clone(&universe));
        self.portfolio.receive_universe(Arc::clone(&universe));
        self.execution.receive_universe(Arc::clone(&universe));

        self.data.initialise()?;
        self.signals.initialise()?;
        self.portfolio.initialise()?;
        self.execution.initialise()?;

        self.universe = universe;
        self.last_refresh = Some(time);
        Ok(())
    }

    /// Process one market event.
    ///
    /// A clean event is collected, preprocessed and propagated, then one
    /// full pass runs. An event failing validation is dropped.
    ///
    /// On a dispatch failure the committed targets stay committed, the
    /// failed order goes back to the head of the queue and the error is
    /// returned.
    pub fn on_event(&mut self, event: &MarketEvent) -> PipelineResult<EventOutcome> {
        self.require(PipelineState::Running)?;
        self.stats.events_received += 1;

        if !self.data.validate(event)? {
            self.stats.events_dropped += 1;
            warn!(
                symbol = event.symbol(),
                kind = %event.kind(),
                time = %event.timestamp(),
                "Dropped event"
            );
            return Ok(EventOutcome::Dropped);
        }

        self.data.collect(event)?;
        self.data.preprocess(event);
        let mut consumers: [&mut dyn SnapshotConsumer; 3] =
            [&mut self.signals, &mut self.portfolio, &mut self.execution];
        self.data.propagate(&mut consumers);

        let dispatched = self.run_pass()?;
        Ok(EventOutcome::Processed { dispatched })
    }

    fn run_pass(&mut self) -> PipelineResult<Option<Uuid>> {
        self.stats.passes += 1;

        self.signals.update_all();
        self.signals.aggregate();
        let signal = self.signals.emit()?;

        let targets = self.portfolio.create_portfolio(&signal);
        let orders = self.portfolio.diff_against_previous(&targets);

        self.execution.execute(orders);
        match self.execution.send_pending() {
            Ok(dispatched) => {
                if dispatched.is_some() {
                    self.stats.orders_dispatched += 1;
                }
                Ok(dispatched)
            }
            Err(failure) => {
                self.stats.dispatch_failures += 1;
                let err = failure.to_error();
                self.execution.requeue_front(failure.order);
                Err(err.into())
            }
        }
    }

    fn refresh_due(&self, time: DateTime<Utc>) -> bool {
        match (self.config.refresh_interval_secs, self.last_refresh) {
            (Some(secs), Some(last)) => i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .is_some_and(|interval| time - last >= interval),
            _ => false,
        }
    }

    /// Drive events from a stream until it ends.
    ///
    /// Starts the pipeline if it is `UniverseReady`. Refreshes the universe
    /// before the first event at or past the refresh interval. Dispatch
    /// failures are logged and the loop continues unless
    /// `halt_on_dispatch_failure` is set; every other error aborts.
    pub async fn run<S>(&mut self, mut events: S) -> PipelineResult<PipelineStats>
    where
        S: Stream<Item = MarketEvent> + Unpin,
    {
        if self.state == PipelineState::UniverseReady {
            self.start()?;
        }
        self.require(PipelineState::Running)?;

        while let Some(event) = events.next().await {
            if self.refresh_due(event.timestamp()) {
                self.refresh_universe(event.timestamp()).await?;
            }

            match self.on_event(&event) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() && !self.config.halt_on_dispatch_failure => {
                    error!(error = %e, pending = self.execution.pending_len(), "Continuing after dispatch failure");
                }
                Err(e) => {
                    error!(error = %e, symbol = event.symbol(), "Pipeline aborted");
                    return Err(e);
                }
            }
        }

        info!(
            events = self.stats.events_received,
            dropped = self.stats.events_dropped,
            dispatched = self.stats.orders_dispatched,
            "Event stream finished"
        );
        Ok(self.stats.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{InstrumentSpec, StaticUniverseConfig, StaticUniverseProvider};
    use chrono::TimeZone;
    use tradeflow_alpha::{AlphaConfig, FactorKey};
    use tradeflow_core::error::{DataError, DispatchError, ExecutionError};
    use tradeflow_core::traits::{FactorComputation, FactorState, NullAlerter};
    use tradeflow_core::types::{Bar, EventKind, Instrument, InstrumentState, Quote, SignalVector, Trade};
    use tradeflow_data::{DataConfig, TradingHours, TradingInterval};
    use tradeflow_execution::{ExecutionConfig, PaperDispatcher};
    use tradeflow_portfolio::PortfolioConfig;

    /// Emits whatever the test last scripted.
    struct ScriptedFactor {
        output: Arc<std::sync::Mutex<SignalVector>>,
    }

    impl FactorComputation for ScriptedFactor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn receive_observation(&mut self, _symbol: &str, _observation: &InstrumentState) {}

        fn generate_signals(&mut self) -> SignalVector {
            self.output.lock().unwrap().clone()
        }

        fn state(&self) -> FactorState {
            FactorState::default()
        }
    }

    struct Harness {
        pipeline: Orchestrator,
        paper: PaperDispatcher,
        script: Arc<std::sync::Mutex<SignalVector>>,
    }

    impl Harness {
        fn script(&self, entries: &[(&str, f64)]) {
            *self.script.lock().unwrap() =
                entries.iter().map(|(s, v)| (s.to_string(), *v)).collect();
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    fn build(symbols: &[&str], capacity: usize, engine: EngineConfig) -> Orchestrator {
        let provider = StaticUniverseProvider::new(StaticUniverseConfig {
            instruments: symbols.iter().map(|s| InstrumentSpec::usd(*s)).collect(),
            ..Default::default()
        });
        let data = DataStage::new(
            DataConfig {
                window_capacity: capacity,
                max_relative_deviation: 0.333,
                trading_hours: TradingHours::uniform(vec![TradingInterval::hm((9, 30), (16, 0))]),
            },
            Arc::new(NullAlerter),
        );
        let signals = SignalStage::new(AlphaConfig { factors: vec![] });
        let portfolio = PortfolioStage::new(PortfolioConfig::default());
        let execution = ExecutionStage::new(ExecutionConfig::default(), Box::new(PaperDispatcher::new()));

        Orchestrator::new(engine, Box::new(provider), data, signals, portfolio, execution)
    }

    async fn harness(symbols: &[&str]) -> Harness {
        let paper = PaperDispatcher::new();
        let mut pipeline = build(symbols, 1000, EngineConfig::default());
        pipeline.execution = ExecutionStage::new(ExecutionConfig::default(), Box::new(paper.clone()));
        pipeline.initialise(at(0, 0, 0)).await.unwrap();
        pipeline.start().unwrap();

        let script = Arc::new(std::sync::Mutex::new(SignalVector::new()));
        let universe: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        pipeline.signals.register(
            FactorKey::new("scripted", universe),
            Box::new(ScriptedFactor {
                output: Arc::clone(&script),
            }),
        );

        Harness {
            pipeline,
            paper,
            script,
        }
    }

    fn quote(symbol: &str, time: DateTime<Utc>, mid: f64) -> MarketEvent {
        Quote::new(symbol, time, mid, mid).into()
    }

    #[tokio::test]
    async fn test_lifecycle_is_enforced() {
        let mut pipeline = build(&["A"], 10, EngineConfig::default());
        let event = quote("A", at(10, 0, 0), 10.0);

        assert!(matches!(
            pipeline.on_event(&event),
            Err(PipelineError::InvalidState { expected: "running", actual: "uninitialized" })
        ));
        assert!(pipeline.start().is_err());
        assert!(pipeline.refresh_universe(at(1, 0, 0)).await.is_err());

        pipeline.initialise(at(0, 0, 0)).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::UniverseReady);
        assert!(pipeline.on_event(&event).is_err());
        assert!(pipeline.initialise(at(0, 0, 0)).await.is_err());

        pipeline.start().unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(pipeline.on_event(&event).is_ok());
    }

    #[tokio::test]
    async fn test_scenario_targets_and_orders() {
        let mut h = harness(&["A", "B"]).await;
        h.script(&[("A", 2.0), ("B", 1.0)]);

        h.pipeline.on_event(&quote("A", at(10, 0, 0), 10.0)).unwrap();
        h.pipeline.on_event(&quote("B", at(10, 0, 1), 20.0)).unwrap();

        // weights {1, 0.5}, unit value 20, multiplier 5000
        let previous = h.pipeline.portfolio().previous_target();
        assert_eq!(previous["A"], 5000);
        assert_eq!(previous["B"], 2500);
        assert_eq!(h.paper.position("A"), 5000);
        assert_eq!(h.paper.position("B"), 2500);

        // B reprices so weights {1, 0.6} keep a unit value of 20: target {A: 5000, B: 3000}
        h.script(&[("A", 1.0), ("B", 0.6)]);
        let outcome = h.pipeline.on_event(&quote("B", at(10, 0, 2), 50.0 / 3.0)).unwrap();
        assert!(matches!(outcome, EventOutcome::Processed { dispatched: Some(_) }));

        let last = h.paper.ledger().sent.last().cloned().unwrap();
        assert_eq!(last.quantities["A"], 0);
        assert_eq!(last.quantities["B"], 500);
    }

    #[tokio::test]
    async fn test_bar_before_open_is_dropped() {
        let mut h = harness(&["X"]).await;
        let bar = Bar::new("X", at(9, 0, 0), 1.0, 1.0, 1.0, 1.0, 100.0).into();

        assert_eq!(h.pipeline.on_event(&bar).unwrap(), EventOutcome::Dropped);
        let state = h.pipeline.data().state().instrument("X").unwrap();
        assert_eq!(state, &InstrumentState::default());
        assert_eq!(h.pipeline.stats().passes, 0);
        assert_eq!(h.paper.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_trade_bootstrap_then_outlier() {
        let mut h = harness(&["Y"]).await;
        let start = at(10, 0, 0);

        for i in 0..1000 {
            let price = if i % 3 == 0 { 1.0 } else { 50.0 + i as f64 };
            let trade = Trade::new("Y", start + Duration::seconds(i), price, 1.0).into();
            assert!(matches!(
                h.pipeline.on_event(&trade).unwrap(),
                EventOutcome::Processed { .. }
            ));
        }
        assert_eq!(h.pipeline.data().window_len("Y", EventKind::Trade), Some(1000));

        let wild = Trade::new("Y", start + Duration::seconds(1000), 1e6, 1.0).into();
        assert_eq!(h.pipeline.on_event(&wild).unwrap(), EventOutcome::Dropped);
        assert_eq!(h.pipeline.stats().events_dropped, 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_requeues_and_keeps_target() {
        let mut h = harness(&["A", "B"]).await;
        h.script(&[("A", 2.0), ("B", 1.0)]);
        h.pipeline.on_event(&quote("A", at(10, 0, 0), 10.0)).unwrap();

        h.paper.fail_next(DispatchError::Connection("gateway down".into()));
        let err = h.pipeline.on_event(&quote("B", at(10, 0, 1), 20.0)).unwrap_err();

        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            PipelineError::Execution(ExecutionError::DispatchFailed { .. })
        ));
        // targets committed, order waiting at the head
        assert_eq!(h.pipeline.portfolio().previous_target()["B"], 2500);
        assert_eq!(h.pipeline.execution().pending_len(), 1);
        let failed = h.pipeline.execution().pending().next().cloned().unwrap();
        assert_eq!(failed.quantities["B"], 2500);

        // next pass replays the failed order before its own
        let outcome = h.pipeline.on_event(&quote("A", at(10, 0, 2), 10.0)).unwrap();
        assert_eq!(outcome, EventOutcome::Processed { dispatched: Some(failed.id) });
        assert_eq!(h.pipeline.execution().pending_len(), 1);
        assert_eq!(h.paper.position("B"), 2500);
        assert_eq!(h.pipeline.stats().dispatch_failures, 1);
    }

    #[tokio::test]
    async fn test_unsupported_event_is_fatal() {
        let mut pipeline = build(&["A"], 10, EngineConfig::default());
        pipeline.initialise(at(0, 0, 0)).await.unwrap();
        pipeline.start().unwrap();

        let unknown = quote("ZZZ", at(10, 0, 0), 1.0);
        assert!(matches!(
            pipeline.on_event(&unknown),
            Err(PipelineError::Data(DataError::UnknownSymbol(_)))
        ));

        let events = tokio_stream::iter(vec![quote("A", at(10, 0, 0), 1.0), unknown]);
        assert!(pipeline.run(events).await.is_err());
        assert_eq!(pipeline.stats().passes, 1);
    }

    #[tokio::test]
    async fn test_run_continues_after_dispatch_failure() {
        let mut h = harness(&["A"]).await;
        h.script(&[("A", 1.0)]);
        h.paper.fail_next(DispatchError::RateLimited { retry_after_secs: 1 });

        let events: Vec<MarketEvent> = (0..3)
            .map(|i| quote("A", at(10, 0, i), 10.0))
            .collect();
        let stats = h.pipeline.run(tokio_stream::iter(events)).await.unwrap();

        assert_eq!(stats.passes, 3);
        assert_eq!(stats.dispatch_failures, 1);
        assert_eq!(stats.orders_dispatched, 2);
        assert_eq!(h.pipeline.execution().pending_len(), 1);
    }

    #[tokio::test]
    async fn test_run_halts_when_configured() {
        let mut pipeline = build(
            &["A"],
            10,
            EngineConfig {
                halt_on_dispatch_failure: true,
                ..Default::default()
            },
        );
        let paper = PaperDispatcher::new();
        pipeline.execution = ExecutionStage::new(ExecutionConfig::default(), Box::new(paper.clone()));
        pipeline.initialise(at(0, 0, 0)).await.unwrap();
        paper.fail_next(DispatchError::Rejected("no".into()));

        let events = tokio_stream::iter(vec![quote("A", at(10, 0, 0), 10.0), quote("A", at(10, 0, 1), 10.0)]);
        assert!(pipeline.run(events).await.is_err());
        assert_eq!(pipeline.stats().passes, 1);
    }

    #[tokio::test]
    async fn test_refresh_on_event_time_interval() {
        let mut pipeline = build(
            &["A"],
            10,
            EngineConfig {
                refresh_interval_secs: Some(3600),
                ..Default::default()
            },
        );
        pipeline.initialise(at(9, 0, 0)).await.unwrap();

        let events = tokio_stream::iter(vec![
            quote("A", at(9, 59, 59), 10.0),
            quote("A", at(10, 0, 0), 10.0),
            quote("A", at(10, 30, 0), 10.0),
            quote("A", at(11, 0, 0), 10.0),
        ]);
        let stats = pipeline.run(events).await.unwrap();

        assert_eq!(stats.refreshes, 2);
        assert_eq!(stats.passes, 4);
        assert_eq!(pipeline.data().state().usd_price("A"), Some(10.0));
    }

    /// Serves each scripted universe in turn, repeating the last.
    struct ShrinkingProvider {
        universes: Vec<Vec<&'static str>>,
        served: usize,
        unsubscribed: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl UniverseProvider for ShrinkingProvider {
        async fn retrieve_full_universe(&mut self) -> Result<Vec<Instrument>, UniverseError> {
            Ok(Vec::new())
        }

        async fn filter_and_cluster(
            &mut self,
            _time: DateTime<Utc>,
        ) -> Result<TradingUniverse, UniverseError> {
            let index = self.served.min(self.universes.len() - 1);
            self.served += 1;
            Ok(self.universes[index]
                .iter()
                .enumerate()
                .fold(TradingUniverse::new(), |u, (i, s)| {
                    u.with_instrument(Instrument::new(*s, "USD", i as u64))
                }))
        }

        async fn subscribe(&mut self, _instrument: &Instrument) -> Result<(), UniverseError> {
            Ok(())
        }

        async fn unsubscribe(&mut self, instrument: &Instrument) -> Result<(), UniverseError> {
            self.unsubscribed.lock().unwrap().push(instrument.symbol.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "shrinking"
        }
    }

    #[tokio::test]
    async fn test_events_for_departed_instrument_are_dropped_after_refresh() {
        let unsubscribed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = build(
            &["A", "B"],
            10,
            EngineConfig {
                refresh_interval_secs: Some(3600),
                ..Default::default()
            },
        );
        pipeline.provider = Box::new(ShrinkingProvider {
            universes: vec![vec!["A", "B"], vec!["A"]],
            served: 0,
            unsubscribed: Arc::clone(&unsubscribed),
        });
        pipeline.initialise(at(9, 0, 0)).await.unwrap();

        let events = tokio_stream::iter(vec![
            quote("B", at(9, 30, 1), 20.0),
            quote("A", at(10, 0, 0), 10.0),
            quote("B", at(10, 0, 1), 20.0),
            quote("A", at(10, 0, 2), 10.0),
        ]);
        let stats = pipeline.run(events).await.unwrap();

        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.passes, 3);
        assert_eq!(stats.events_dropped, 1);
        assert_eq!(*unsubscribed.lock().unwrap(), vec!["B".to_string()]);
        assert!(!pipeline.universe().contains("B"));
    }
}
