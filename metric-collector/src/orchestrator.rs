/**
 * ORCHESTRATOR - One collection run from inventory to run stats
 *
 * Shard filter, host selection, scheduling over execution units, then a
 * single run stats point once every unit has joined.
 */

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{Concurrency, RunConfig};
use crate::devices::DriverRegistry;
use crate::errors::ConfigError;
use crate::inventory::Inventory;
use crate::models::RunStats;
use crate::pipeline::CollectionContext;
use crate::scheduler;
use crate::sink::Sink;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub devices_selected: usize,
    pub units: usize,
    pub elapsed_seconds: f64,
}

pub struct Orchestrator {
    config: RunConfig,
    drivers: DriverRegistry,
    sink: Arc<dyn Sink>,
}

impl Orchestrator {
    pub fn new(config: RunConfig, drivers: DriverRegistry, sink: Arc<dyn Sink>) -> Self {
        Self { config, drivers, sink }
    }

    /// Loads the three input tables, then runs. Only configuration problems
    /// are errors; device and delivery failures are logged and counted.
    /// The run time reported in the run stats includes the loading.
    pub async fn run(self) -> Result<RunSummary, ConfigError> {
        let started = Instant::now();
        let inventory = Inventory::load(&self.config.inputs).await?;
        if inventory.is_empty() {
            warn!("Hosts table {} lists no device", self.config.inputs.hosts.display());
        }
        Ok(self.execute(inventory, started).await)
    }

    pub async fn run_with_inventory(self, inventory: Inventory) -> RunSummary {
        self.execute(inventory, Instant::now()).await
    }

    async fn execute(self, mut inventory: Inventory, started: Instant) -> RunSummary {
        let Orchestrator { config, drivers, sink } = self;

        if let Some(shard) = &config.shard {
            let owned = shard.select(inventory.host_ids().map(str::to_string));
            info!(
                "Shard {}/{}: {} of {} devices",
                shard.index(),
                shard.count(),
                owned.len(),
                inventory.len()
            );
            inventory.retain_hosts(&owned);
        }

        let hosts = inventory.select_hosts(&config.host_selector);
        if hosts.is_empty() {
            warn!("No device matches the requested tags");
        } else {
            info!("{} devices selected", hosts.len());
        }

        let ctx = Arc::new(CollectionContext {
            inventory,
            command_selector: config.command_selector.clone(),
            drivers,
            sink: sink.clone(),
        });
        let report = scheduler::run(ctx, hosts, config.concurrency).await;

        let elapsed_seconds = started.elapsed().as_secs_f64();
        let stats = RunStats {
            elapsed_seconds,
            devices_selected: report.hosts,
            threads_used: match config.concurrency {
                Concurrency::Buckets(_) => Some(report.units),
                Concurrency::Sequential => None,
            },
            shard_label: config.shard_label.clone(),
        };
        sink.emit(&[stats.to_point()]).await;
        info!("End of collection: {} devices in {:.4}s", report.hosts, elapsed_seconds);

        RunSummary { devices_selected: report.hosts, units: report.units, elapsed_seconds }
    }
}
