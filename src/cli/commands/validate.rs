//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use tradeflow_config::load_validated;

pub async fn run(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match load_validated(config_path) {
        Ok(config) => {
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Instruments: {}", config.universe.instruments.len());
            println!("Clusters: {}", config.universe.clusters.len());
            println!("Window capacity: {}", config.data.window_capacity);
            println!("Max relative deviation: {}", config.data.max_relative_deviation);
            let kinds: Vec<&str> = config.alpha.factors.iter().map(|f| f.kind.as_str()).collect();
            println!("Factors: {}", kinds.join(", "));
            println!("Firm equity: {}", config.portfolio.firm_equity);
            println!("Default leverage: {}", config.portfolio.default_leverage);
            println!("Optimizer: {:?}", config.portfolio.optimizer);
            println!("Slicing: {:?}", config.execution.slicing);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
