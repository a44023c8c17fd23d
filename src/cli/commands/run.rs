//! Replay command implementation.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tradeflow_alpha::SignalStage;
use tradeflow_config::load_validated;
use tradeflow_core::types::TargetPortfolio;
use tradeflow_data::{load_csv, DataStage};
use tradeflow_engine::{Orchestrator, PipelineStats, StaticUniverseProvider};
use tradeflow_execution::{ExecutionStage, PaperDispatcher};
use tradeflow_monitor::TracingAlerter;
use tradeflow_portfolio::PortfolioStage;

use crate::cli::{OutputFormat, RunArgs};

/// What a replay produced.
#[derive(Debug, Serialize)]
struct RunSummary {
    events_file: String,
    stats: PipelineStats,
    drop_rate: f64,
    alerts: u64,
    factors: Vec<String>,
    target: TargetPortfolio,
    positions: BTreeMap<String, i64>,
    pending_orders: usize,
}

impl RunSummary {
    fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Replay Summary\n");
        out.push_str("═══════════════════════════════════════════════════════════\n");
        out.push_str(&format!("Events file:        {}\n", self.events_file));
        out.push_str(&format!("Events received:    {}\n", self.stats.events_received));
        out.push_str(&format!(
            "Events dropped:     {} ({:.2}%)\n",
            self.stats.events_dropped,
            self.drop_rate * 100.0
        ));
        out.push_str(&format!("Data alerts:        {}\n", self.alerts));
        out.push_str(&format!("Pipeline passes:    {}\n", self.stats.passes));
        out.push_str(&format!("Orders dispatched:  {}\n", self.stats.orders_dispatched));
        out.push_str(&format!("Dispatch failures:  {}\n", self.stats.dispatch_failures));
        out.push_str(&format!("Pending orders:     {}\n", self.pending_orders));
        out.push_str(&format!("Universe refreshes: {}\n", self.stats.refreshes));
        out.push('\n');

        out.push_str("Factors\n");
        out.push_str("───────────────────────────────────────────────────────────\n");
        for factor in &self.factors {
            out.push_str(&format!("  {}\n", factor));
        }
        out.push('\n');

        out.push_str("Positions (target / filled)\n");
        out.push_str("───────────────────────────────────────────────────────────\n");
        let mut symbols: Vec<&String> = self.target.keys().chain(self.positions.keys()).collect();
        symbols.sort();
        symbols.dedup();
        for symbol in symbols {
            out.push_str(&format!(
                "  {:<10} {:>12} {:>12}\n",
                symbol,
                self.target.get(symbol).copied().unwrap_or(0),
                self.positions.get(symbol).copied().unwrap_or(0)
            ));
        }
        out
    }
}

pub async fn run(args: RunArgs, config_path: &Path) -> Result<()> {
    let config = load_validated(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;

    let events = load_csv(&args.events)
        .with_context(|| format!("Failed to read events from {}", args.events.display()))?;
    let Some(first) = events.first() else {
        bail!("Event file '{}' contains no events", args.events.display());
    };
    let start = first.timestamp();
    info!(events = events.len(), start = %start, "Loaded market events");

    let alerter = Arc::new(TracingAlerter::new());
    let paper = PaperDispatcher::new();

    let mut orchestrator = Orchestrator::new(
        config.engine.clone(),
        Box::new(StaticUniverseProvider::new(config.universe.clone())),
        DataStage::new(config.data.clone(), alerter.clone()),
        SignalStage::new(config.alpha.clone()),
        PortfolioStage::new(config.portfolio.clone()),
        ExecutionStage::new(config.execution, Box::new(paper.clone())),
    );

    orchestrator
        .initialise(start)
        .await
        .context("Failed to initialise pipeline")?;
    let stats = orchestrator
        .run(tokio_stream::iter(events))
        .await
        .context("Pipeline aborted")?;

    let summary = RunSummary {
        events_file: args.events.display().to_string(),
        drop_rate: stats.drop_rate(),
        stats,
        alerts: alerter.count(),
        factors: orchestrator
            .signals()
            .factor_keys()
            .map(|key| key.to_string())
            .collect(),
        target: orchestrator.portfolio().previous_target().clone(),
        positions: paper.ledger().positions,
        pending_orders: orchestrator.execution().pending_len(),
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => println!("{}", summary.to_text()),
    }

    if let Some(save_path) = &args.save {
        std::fs::write(save_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Summary saved to {:?}", save_path);
    }

    Ok(())
}
