//! Immutable run configuration, validated once from the command line and
//! then shared read-only with every execution unit.

use std::time::Duration;

use crate::cli::{Cli, OutputType};
use crate::devices::DriverSettings;
use crate::errors::ConfigError;
use crate::inventory::{resolve_input, InputFiles};
use crate::selector::TagSelector;
use crate::shard::Shard;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    Stdout,
    Http(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One unit walks every host.
    Sequential,
    /// At most this many units, each owning a contiguous bucket of hosts.
    Buckets(usize),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub inputs: InputFiles,
    pub host_selector: TagSelector,
    pub command_selector: TagSelector,
    pub shard: Option<Shard>,
    /// Descriptor as given by the caller, reported in the run stats.
    pub shard_label: Option<String>,
    pub output: OutputTarget,
    pub concurrency: Concurrency,
    pub driver: DriverSettings,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let inputs = InputFiles {
            hosts: resolve_input(&cli.input, &cli.hosts),
            commands: resolve_input(&cli.input, &cli.commands),
            credentials: resolve_input(&cli.input, &cli.credentials),
        };

        let shard = cli
            .sharding
            .as_deref()
            .map(|descriptor| Shard::parse(descriptor, cli.sharding_offset))
            .transpose()?;

        let output = match cli.output_type {
            OutputType::Stdout => OutputTarget::Stdout,
            OutputType::Http => {
                reqwest::Url::parse(&cli.output_addr).map_err(|e| {
                    ConfigError::InvalidSetting(format!("output address '{}': {e}", cli.output_addr))
                })?;
                OutputTarget::Http(cli.output_addr.clone())
            }
        };

        let concurrency = if cli.use_thread {
            if cli.nbr_thread == 0 {
                return Err(ConfigError::InvalidSetting("--nbr-thread must be at least 1".into()));
            }
            Concurrency::Buckets(cli.nbr_thread)
        } else {
            Concurrency::Sequential
        };

        Ok(Self {
            inputs,
            host_selector: TagSelector::new(cli.tags.as_slice())?,
            command_selector: TagSelector::new(cli.cmd_tags.as_slice())?,
            shard,
            shard_label: cli.sharding.clone(),
            output,
            concurrency,
            driver: DriverSettings {
                timeout: Duration::from_secs(cli.timeout),
                connect_attempts: cli.retry,
                retry_delay: Duration::from_secs(cli.retry_delay),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Result<RunConfig, ConfigError> {
        let mut argv = vec!["metric-collector", "-s"];
        argv.extend_from_slice(args);
        RunConfig::from_cli(&Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_default_run_config() {
        let config = parse(&["-i", "/etc/collector"]).unwrap();
        assert_eq!(config.inputs.hosts, PathBuf::from("/etc/collector/hosts.yaml"));
        assert_eq!(config.output, OutputTarget::Stdout);
        assert_eq!(config.concurrency, Concurrency::Buckets(10));
        assert!(config.shard.is_none());
        assert_eq!(config.driver.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_sharding_offset() {
        let config = parse(&["--sharding", "0/3"]).unwrap();
        assert_eq!(config.shard, Some(Shard::new(1, 3).unwrap()));
        assert_eq!(config.shard_label.as_deref(), Some("0/3"));

        let config = parse(&["--sharding", "3/3", "--sharding-offset", "false"]).unwrap();
        assert_eq!(config.shard, Some(Shard::new(3, 3).unwrap()));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(matches!(parse(&["--sharding", "3/3"]), Err(ConfigError::ShardOutOfRange { .. })));
        assert!(matches!(parse(&["--sharding", "3"]), Err(ConfigError::MalformedShard(_))));
        assert!(matches!(parse(&["--nbr-thread", "0"]), Err(ConfigError::InvalidSetting(_))));
        assert!(matches!(parse(&["--tag", "(unclosed"]), Err(ConfigError::InvalidPattern { .. })));
        assert!(matches!(
            parse(&["--output-type", "http", "--output-addr", "not a url"]),
            Err(ConfigError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_driver_settings_from_flags() {
        let config = parse(&["--timeout", "30", "--retry", "2", "--retry-delay", "7"]).unwrap();
        assert_eq!(
            config.driver,
            DriverSettings {
                timeout: Duration::from_secs(30),
                connect_attempts: 2,
                retry_delay: Duration::from_secs(7),
            }
        );
    }

    #[test]
    fn test_sequential_ignores_thread_count() {
        let config = parse(&["--use-thread", "false", "--nbr-thread", "0"]).unwrap();
        assert_eq!(config.concurrency, Concurrency::Sequential);
    }
}
