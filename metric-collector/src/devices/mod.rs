//! Device session drivers.
//!
//! The orchestrator only sees the [`DeviceDriver`] capability: a driver
//! either ends up connected or not, and each `collect` call either returns
//! points or fails. Drivers are picked by device type through a
//! [`DriverRegistry`], so new families plug in without touching the
//! scheduler.

pub mod f5;
pub mod json_points;
pub mod junos;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::inventory::Credential;
use crate::models::{MetricPoint, PointError};

/// Errors raised by device drivers
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("unknown device type '{0}'")]
    UnknownDeviceType(String),
    #[error("no credential found for host {0}")]
    MissingCredential(String),
    #[error("device is not connected")]
    NotConnected,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("invalid reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Point(#[from] PointError),
    #[error("{0}")]
    Failed(String),
}

/// Everything a driver needs to open a session to one host.
#[derive(Debug, Clone)]
pub struct DeviceTarget {
    pub host_id: String,
    pub address: String,
    pub device_type: String,
    pub credential: Option<Credential>,
}

impl DeviceTarget {
    pub fn require_credential(&self) -> Result<&Credential, DeviceError> {
        self.credential
            .as_ref()
            .ok_or_else(|| DeviceError::MissingCredential(self.host_id.clone()))
    }

    /// An address that already carries a scheme is used verbatim.
    pub fn base_url(&self, default_scheme: &str, default_port: Option<u16>) -> String {
        if self.address.contains("://") {
            return self.address.trim_end_matches('/').to_string();
        }
        match default_port {
            Some(port) => format!("{default_scheme}://{}:{port}", self.address),
            None => format!("{default_scheme}://{}", self.address),
        }
    }
}

/// Session knobs shared by every driver of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub timeout: Duration,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            connect_attempts: 5,
            retry_delay: Duration::from_secs(3),
        }
    }
}

#[async_trait]
pub trait DeviceDriver: Send {
    /// Opens the session. Failures are also reflected by `is_connected`.
    async fn connect(&mut self) -> Result<(), DeviceError>;

    fn is_connected(&self) -> bool;

    /// Reads device facts once before commands run.
    async fn collect_facts(&mut self) -> Result<(), DeviceError>;

    async fn collect(&mut self, command: &str) -> Result<Vec<MetricPoint>, DeviceError>;
}

type DriverBuilder =
    Box<dyn Fn(&DeviceTarget, &DriverSettings) -> Result<Box<dyn DeviceDriver>, DeviceError> + Send + Sync>;

/// Device type -> driver constructor.
pub struct DriverRegistry {
    builders: HashMap<String, DriverBuilder>,
    settings: DriverSettings,
}

impl DriverRegistry {
    pub fn new(settings: DriverSettings) -> Self {
        Self { builders: HashMap::new(), settings }
    }

    /// Registry with the `juniper` and `f5` families.
    pub fn with_default_drivers(settings: DriverSettings) -> Self {
        let mut registry = Self::new(settings);
        registry.register("juniper", |target, settings| {
            Ok(Box::new(junos::JunosDriver::new(target, settings)?) as Box<dyn DeviceDriver>)
        });
        registry.register("f5", |target, settings| {
            Ok(Box::new(f5::F5Driver::new(target, settings)?) as Box<dyn DeviceDriver>)
        });
        registry
    }

    pub fn register<F>(&mut self, device_type: impl Into<String>, builder: F)
    where
        F: Fn(&DeviceTarget, &DriverSettings) -> Result<Box<dyn DeviceDriver>, DeviceError>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(device_type.into(), Box::new(builder));
    }

    pub fn create(&self, target: &DeviceTarget) -> Result<Box<dyn DeviceDriver>, DeviceError> {
        let builder = self
            .builders
            .get(&target.device_type)
            .ok_or_else(|| DeviceError::UnknownDeviceType(target.device_type.clone()))?;
        builder(target, &self.settings)
    }

    pub fn device_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
