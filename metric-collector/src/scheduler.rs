//! Spreads the selected hosts over execution units and waits for all of
//! them. Each unit streams every host's points to the sink as soon as the
//! host is done.

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use crate::config::Concurrency;
use crate::pipeline::{collect_host, CollectionContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub hosts: usize,
    /// Units actually started, zero when no host was selected.
    pub units: usize,
}

/// Contiguous slices of `ceil(n / units)` items; fewer slices than `units`
/// when there are not enough items to go around.
pub fn buckets<T: Clone>(items: &[T], units: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let size = items.len().div_ceil(units.max(1));
    items.chunks(size).map(<[T]>::to_vec).collect()
}

pub async fn run(ctx: Arc<CollectionContext>, mut hosts: Vec<String>, mode: Concurrency) -> SchedulerReport {
    hosts.sort();
    hosts.dedup();
    let total = hosts.len();

    match mode {
        Concurrency::Sequential => {
            info!("Collecting {} devices sequentially", total);
            let units = usize::from(total > 0);
            run_unit(ctx, 0, hosts).instrument(info_span!("unit", id = 0)).await;
            SchedulerReport { hosts: total, units }
        }
        Concurrency::Buckets(max_units) => {
            let groups = buckets(&hosts, max_units);
            let units = groups.len();
            info!("Collecting {} devices over {} units", total, units);

            let handles: Vec<_> = groups
                .into_iter()
                .enumerate()
                .map(|(id, bucket)| {
                    let ctx = ctx.clone();
                    tokio::spawn(run_unit(ctx, id, bucket).instrument(info_span!("unit", id)))
                })
                .collect();

            for (id, joined) in join_all(handles).await.into_iter().enumerate() {
                if let Err(e) = joined {
                    error!("unit {} aborted: {}", id, e);
                }
            }
            SchedulerReport { hosts: total, units }
        }
    }
}

async fn run_unit(ctx: Arc<CollectionContext>, id: usize, hosts: Vec<String>) {
    info!("unit {} starting with {} devices", id, hosts.len());
    for host_id in &hosts {
        let collected = AssertUnwindSafe(collect_host(&ctx, host_id))
            .catch_unwind()
            .instrument(info_span!("host", id = %host_id))
            .await;
        match collected {
            Ok(points) => ctx.sink.emit(&points).await,
            Err(_) => error!("[{}] collection panicked, no points emitted", host_id),
        }
    }
    info!("unit {} finished", id);
}
