use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_OUTPUT_ADDR: &str = "http://localhost:8186/write";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "metric-collector",
    version,
    about = "Collect metrics from network devices and print them as line protocol",
    arg_required_else_help = true
)]
pub struct Cli {
    #[arg(long = "tag", num_args = 1.., help = "Collect data from hosts that match the tag")]
    pub tags: Vec<String>,

    #[arg(long = "cmd-tag", num_args = 1.., help = "Collect data from commands that match the tag")]
    pub cmd_tags: Vec<String>,

    #[arg(short, long, help = "Console logs enabled (stderr)")]
    pub console: bool,

    #[arg(short, long, help = "Start collecting (default 'no')")]
    pub start: bool,

    #[arg(short, long, default_value = ".", env = "METRIC_COLLECTOR_INPUT", help = "Directory where to find input files")]
    pub input: PathBuf,

    #[arg(long, default_value_t = 20, help = "Logs verbosity, 10-debug, 50 Critical")]
    pub loglvl: u8,

    #[arg(long, default_value = "logs", env = "METRIC_COLLECTOR_LOGDIR", help = "Directory where to store logs")]
    pub logdir: PathBuf,

    #[arg(long, env = "METRIC_COLLECTOR_SHARDING", help = "Place in the shard and size of the shard, e.g. 0/3")]
    pub sharding: Option<String>,

    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        help = "Add 1 to the shard index (index given 0-based)"
    )]
    pub sharding_offset: bool,

    #[arg(long, default_value_t = 600, help = "Per-request timeout for device sessions (seconds)")]
    pub timeout: u64,

    #[arg(long, default_value_t = 5, help = "Max connection attempts per device")]
    pub retry: u32,

    #[arg(long, default_value_t = 3, help = "Delay between connection attempts (seconds)")]
    pub retry_delay: u64,

    #[arg(long, default_value = "hosts.yaml", help = "Hosts file in YAML, or dynamic inventory executable")]
    pub hosts: PathBuf,

    #[arg(long, default_value = "commands.yaml", help = "Commands file in YAML")]
    pub commands: PathBuf,

    #[arg(long, default_value = "credentials.yaml", help = "Credentials file in YAML")]
    pub credentials: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputType::Stdout, env = "METRIC_COLLECTOR_OUTPUT_TYPE")]
    pub output_type: OutputType,

    #[arg(long, default_value = DEFAULT_OUTPUT_ADDR, env = "METRIC_COLLECTOR_OUTPUT_ADDR", help = "Write endpoint for http output")]
    pub output_addr: String,

    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        help = "Spread devices over several concurrent collector units"
    )]
    pub use_thread: bool,

    #[arg(long, default_value_t = 10, env = "METRIC_COLLECTOR_NBR_THREAD", help = "Maximum number of collector units")]
    pub nbr_thread: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputType {
    Stdout,
    Http,
}
