/*!
Test harness running a full collection in-process.

The run goes through the real CLI parsing, configuration validation,
inventory loaders, scheduler and pipeline; only the device drivers and the
sink are swapped for scripted ones.
*/

use anyhow::{Context, Result};
use clap::Parser;
use metric_collector::cli::Cli;
use metric_collector::models::{HOST_STATS_MEASUREMENT, RUN_STATS_MEASUREMENT};
use metric_collector::{MetricPoint, Orchestrator, RunConfig, RunSummary};
use std::sync::Arc;

use crate::capture_sink::CaptureSink;
use crate::device_stub::ScriptedFleet;
use crate::fixtures::InventoryFixture;

pub const DEVICE_TYPES: &[&str] = &["juniper", "f5"];

pub struct TestHarness {
    pub fixture: InventoryFixture,
    pub fleet: ScriptedFleet,
}

/// Output of one harness run.
pub struct RunOutcome {
    pub summary: RunSummary,
    pub sink: CaptureSink,
}

impl TestHarness {
    pub fn new(fixture: InventoryFixture) -> Self {
        // tests may run in the same process; only the first init wins
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self { fixture, fleet: ScriptedFleet::new() }
    }

    pub fn with_fleet(mut self, fleet: ScriptedFleet) -> Self {
        self.fleet = fleet;
        self
    }

    /// Runs with the given command-line flags; `-s` and `-i <fixture dir>`
    /// are added.
    pub async fn run(&self, args: &[&str]) -> Result<RunOutcome> {
        let dir = self.fixture.write()?;
        let mut argv = vec!["metric-collector".to_string(), "-s".into(), "-i".into()];
        argv.push(dir.display().to_string());
        argv.extend(args.iter().map(|a| a.to_string()));

        let cli = Cli::try_parse_from(argv).context("invalid test arguments")?;
        let config = RunConfig::from_cli(&cli)?;

        let sink = CaptureSink::new();
        let summary = Orchestrator::new(config, self.fleet.registry(DEVICE_TYPES), Arc::new(sink.clone()))
            .run()
            .await?;
        Ok(RunOutcome { summary, sink })
    }
}

impl RunOutcome {
    pub fn host_stats(&self, host: &str) -> Option<MetricPoint> {
        self.sink
            .measurement(HOST_STATS_MEASUREMENT)
            .into_iter()
            .find(|p| p.tag("device") == Some(host))
    }

    /// Hosts that produced a stats point, in emission order.
    pub fn collected_hosts(&self) -> Vec<String> {
        self.sink
            .measurement(HOST_STATS_MEASUREMENT)
            .iter()
            .filter_map(|p| p.tag("device").map(str::to_string))
            .collect()
    }

    pub fn run_stats(&self) -> Option<MetricPoint> {
        self.sink.measurement(RUN_STATS_MEASUREMENT).pop()
    }
}
