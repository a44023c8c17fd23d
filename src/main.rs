//! TradeFlow CLI application.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;
use tradeflow_config::{load_config, LoggingConfig};
use tradeflow_monitor::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Flags win over the [logging] section; a broken config file is
    // reported by the command itself
    let logging = load_config(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_else(|_| LoggingConfig::default());
    let log_level = match cli.log_level {
        Some(cli::LogLevel::Trace) => "trace",
        Some(cli::LogLevel::Debug) => "debug",
        Some(cli::LogLevel::Info) => "info",
        Some(cli::LogLevel::Warn) => "warn",
        Some(cli::LogLevel::Error) => "error",
        None => logging.level.as_str(),
    };
    let log_file = cli.log_file.clone().or_else(|| logging.file.as_ref().map(PathBuf::from));
    let _guard = setup_logging(log_level, cli.json_logs || logging.is_json(), log_file.as_deref());

    match cli.command {
        Commands::Run(args) => cli::commands::run::run(args, &cli.config).await,
        Commands::Factors => cli::commands::factors::run().await,
        Commands::ValidateConfig => cli::commands::validate::run(&cli.config).await,
    }
}
