use std::path::PathBuf;

/// Problems found while assembling a run. All of them abort before any
/// device is contacted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sharding descriptor '{0}' is not of the form index/count")]
    MalformedShard(String),
    #[error("shard index {index} is outside 1..={count}")]
    ShardOutOfRange { index: u32, count: u32 },
    #[error("invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("{0} holds no command document")]
    EmptyCommands(PathBuf),
}
