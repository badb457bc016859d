/**
 * METRIC COLLECTOR - entry point
 *
 * .env + CLI -> logs -> validated run config -> drivers + sink -> one run.
 * Any configuration problem exits non-zero before a device is contacted.
 */

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use metric_collector::cli::Cli;
use metric_collector::devices::DriverRegistry;
use metric_collector::logging::{self, LogSettings};
use metric_collector::sink::build_sink;
use metric_collector::{Orchestrator, RunConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if !cli.start {
        println!("Missing <start> option, so nothing to do");
        return Ok(());
    }

    let _log_guard = logging::init(&LogSettings::from(&cli))?;

    let config = RunConfig::from_cli(&cli).context("Invalid configuration")?;
    let drivers = DriverRegistry::with_default_drivers(config.driver.clone());
    let sink = build_sink(&config.output).context("Failed to build output sink")?;

    let summary = Orchestrator::new(config, drivers, sink)
        .run()
        .await
        .context("Failed to load inventory")?;

    info!(
        "Collected {} devices with {} units in {:.4}s",
        summary.devices_selected, summary.units, summary.elapsed_seconds
    );
    Ok(())
}
