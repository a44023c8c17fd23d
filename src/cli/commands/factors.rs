//! List factors command.

use anyhow::Result;
use tradeflow_alpha::FactorCatalog;

pub async fn run() -> Result<()> {
    let catalog = FactorCatalog::new();

    println!("Available Factors");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in catalog.list() {
        println!("  {} ({:?})", info.kind, info.default_derivation);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  defaults: {}", info.default_params);
        println!();
    }

    println!("Select factors with [[alpha.factors]] kind = \"<name>\" in the config file.");

    Ok(())
}
