//! Per-host collection: connect, read facts, run each selected command in
//! order, then add the host stats point and the host context tags.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::devices::{DeviceDriver, DriverRegistry};
use crate::inventory::Inventory;
use crate::models::{CollectionStats, MetricPoint};
use crate::selector::TagSelector;
use crate::sink::Sink;

/// Read-only state shared by every execution unit of a run.
pub struct CollectionContext {
    pub inventory: Inventory,
    pub command_selector: TagSelector,
    pub drivers: DriverRegistry,
    pub sink: Arc<dyn Sink>,
}

/// Runs the whole pipeline for one host and returns its points, stats
/// point included. Never fails: every error is logged and counted.
pub async fn collect_host(ctx: &CollectionContext, host_id: &str) -> Vec<MetricPoint> {
    let commands = ctx.inventory.select_commands(host_id, &ctx.command_selector);
    debug!("[{}] {} commands selected", host_id, commands.len());

    let mut stats = CollectionStats::default();
    let mut points = Vec::new();

    match open_session(ctx, host_id).await {
        Some(mut driver) => {
            stats.reachable = true;
            let started = Instant::now();
            for command in &commands {
                match driver.collect(command).await {
                    Ok(mut produced) => {
                        stats.record_success();
                        debug!("[{}] '{}' produced {} points", host_id, command, produced.len());
                        points.append(&mut produced);
                    }
                    Err(e) => {
                        stats.record_failure();
                        error!("[{}] command '{}' failed: {}", host_id, command, e);
                    }
                }
            }
            stats.elapsed_seconds = started.elapsed().as_secs_f64();
        }
        None => warn!("[{}] unreachable, skipping {} commands", host_id, commands.len()),
    }

    info!(
        "[{}] done: {} commands, {} ok, {} failed in {:.4}s",
        host_id, stats.commands_total, stats.commands_ok, stats.commands_failed, stats.elapsed_seconds
    );
    points.push(stats.to_point(host_id));

    match ctx.inventory.context(host_id) {
        Some(context) if !context.is_empty() => {
            points.into_iter().map(|p| p.with_context(context)).collect()
        }
        _ => points,
    }
}

/// Driver in the connected state with facts read, or `None` when the host
/// cannot be reached.
async fn open_session(ctx: &CollectionContext, host_id: &str) -> Option<Box<dyn DeviceDriver>> {
    let target = match ctx.inventory.device_target(host_id) {
        Some(target) => target,
        None => {
            error!("[{}] not in inventory", host_id);
            return None;
        }
    };

    let mut driver = match ctx.drivers.create(&target) {
        Ok(driver) => driver,
        Err(e) => {
            error!("[{}] cannot create {} driver: {}", host_id, target.device_type, e);
            return None;
        }
    };

    info!("[{}] connecting to {} ({})", host_id, target.address, target.device_type);
    if let Err(e) = driver.connect().await {
        error!("[{}] connection failed: {}", host_id, e);
    }
    if !driver.is_connected() {
        return None;
    }

    if let Err(e) = driver.collect_facts().await {
        warn!("[{}] unable to collect facts: {}", host_id, e);
    }
    Some(driver)
}
