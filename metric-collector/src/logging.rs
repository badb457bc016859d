//! Log setup: a daily file under the log directory, plus stderr when
//! console logs are requested. Standard output carries metric lines only.
//! `RUST_LOG` overrides the configured level.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::Cli;

pub const LOG_FILE_PREFIX: &str = "metric_collector.log";

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub dir: PathBuf,
    pub console: bool,
}

impl From<&Cli> for LogSettings {
    fn from(cli: &Cli) -> Self {
        Self {
            level: level_from_verbosity(cli.loglvl),
            dir: cli.input.join(&cli.logdir),
            console: cli.console,
        }
    }
}

/// Maps the numeric verbosity scale (10 debug .. 50 critical).
pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0..=9 => LevelFilter::TRACE,
        10..=19 => LevelFilter::DEBUG,
        20..=29 => LevelFilter::INFO,
        30..=39 => LevelFilter::WARN,
        _ => LevelFilter::ERROR,
    }
}

/// Installs the global subscriber. Keep the returned guard alive until the
/// run ends or buffered file lines are lost.
pub fn init(settings: &LogSettings) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&settings.dir)
        .with_context(|| format!("Failed to create log directory {}", settings.dir.display()))?;

    let file = tracing_appender::rolling::daily(&settings.dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::builder()
        .with_default_directive(settings.level.into())
        .from_env_lossy();

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false).with_thread_names(true);
    let console_layer = settings
        .console
        .then(|| fmt::layer().with_writer(std::io::stderr).with_thread_names(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_verbosity_scale() {
        assert_eq!(level_from_verbosity(10), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(20), LevelFilter::INFO);
        assert_eq!(level_from_verbosity(30), LevelFilter::WARN);
        assert_eq!(level_from_verbosity(40), LevelFilter::ERROR);
        assert_eq!(level_from_verbosity(50), LevelFilter::ERROR);
    }

    #[test]
    fn test_settings_from_cli() {
        let cli = Cli::parse_from(["metric-collector", "-s", "-c", "-i", "/srv/mc", "--loglvl", "10"]);
        let settings = LogSettings::from(&cli);
        assert!(settings.console);
        assert_eq!(settings.level, LevelFilter::DEBUG);
        assert_eq!(settings.dir, PathBuf::from("/srv/mc/logs"));
    }
}
