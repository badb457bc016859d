/*!
# metric-collector

Batch job that walks a fleet of network devices, runs the selected commands
on each one and prints the results as line protocol (stdout or an HTTP
write endpoint).

Flow of a run:
- `config`: one immutable [`config::RunConfig`] validated from the CLI
- `inventory` + `shard` + `selector`: which hosts and which commands
- `scheduler`: buckets of hosts, one execution unit per bucket
- `pipeline`: connect, facts, commands, stats, context tags for one host
- `line_protocol` + `sink`: encode and deliver every point
*/

pub mod cli;
pub mod config;
pub mod devices;
pub mod errors;
pub mod inventory;
pub mod line_protocol;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod scheduler;
pub mod selector;
pub mod shard;
pub mod sink;

pub use config::RunConfig;
pub use models::MetricPoint;
pub use orchestrator::{Orchestrator, RunSummary};
