//! F5 BIG-IP over iControl REST.
//!
//! A command is a path below `/mgmt/tm/` (e.g. `ltm/virtual/stats`). Stats
//! replies list one entry per object; each entry becomes its own point
//! tagged with the object name.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::json_points::{measurement_name, numeric_fields, reply_to_points, sanitize};
use super::{DeviceDriver, DeviceError, DeviceTarget, DriverSettings};
use crate::inventory::Credential;
use crate::models::MetricPoint;

const API_ROOT: &str = "mgmt/tm";

pub struct F5Driver {
    host_id: String,
    base_url: String,
    credential: Credential,
    client: Client,
    settings: DriverSettings,
    connected: bool,
    sys_version: Option<Value>,
    version: Option<String>,
}

impl F5Driver {
    pub fn new(target: &DeviceTarget, settings: &DriverSettings) -> Result<Self, DeviceError> {
        let credential = target.require_credential()?.clone();
        // BIG-IP management interfaces ship self-signed certificates.
        let client = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            host_id: target.host_id.clone(),
            base_url: target.base_url("https", None),
            credential,
            client,
            settings: settings.clone(),
            connected: false,
            sys_version: None,
            version: None,
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn url(&self, command: &str) -> String {
        let path = command.trim().trim_start_matches('/');
        let path = path.strip_prefix(API_ROOT).unwrap_or(path).trim_start_matches('/');
        format!("{}/{API_ROOT}/{path}", self.base_url)
    }

    async fn get(&self, command: &str) -> Result<Value, DeviceError> {
        let url = self.url(command);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credential.username, Some(&self.credential.password))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Status { status: status.as_u16(), url });
        }
        Ok(response.json().await?)
    }
}

/// `https://localhost/mgmt/tm/ltm/virtual/~Common~vs1/stats` -> `~Common~vs1`
fn entry_name(self_link: &str) -> String {
    let path = self_link.split('?').next().unwrap_or(self_link);
    let trimmed = path.trim_end_matches('/').trim_end_matches("/stats");
    sanitize(trimmed.rsplit('/').next().unwrap_or(trimmed))
}

fn stats_points(
    host_id: &str,
    command: &str,
    entries: &serde_json::Map<String, Value>,
) -> Result<Vec<MetricPoint>, DeviceError> {
    let measurement = measurement_name(command);
    let mut points = Vec::new();
    for (link, entry) in entries {
        let fields = numeric_fields(entry);
        if fields.is_empty() {
            continue;
        }
        let tags = BTreeMap::from([
            ("device".to_string(), host_id.to_string()),
            ("name".to_string(), entry_name(link)),
        ]);
        points.push(MetricPoint::new(measurement.clone(), tags, fields)?);
    }
    Ok(points)
}

#[async_trait]
impl DeviceDriver for F5Driver {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        let attempts = self.settings.connect_attempts.max(1);
        let mut last_error = DeviceError::NotConnected;
        for attempt in 1..=attempts {
            match self.get("sys/version").await {
                Ok(reply) => {
                    self.connected = true;
                    self.sys_version = Some(reply);
                    debug!("[{}] connected to {}", self.host_id, self.base_url);
                    return Ok(());
                }
                Err(e) => {
                    warn!("[{}] connection attempt {}/{} failed: {}", self.host_id, attempt, attempts, e);
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }
        self.connected = false;
        Err(last_error)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn collect_facts(&mut self) -> Result<(), DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let reply = match self.sys_version.take() {
            Some(reply) => reply,
            None => self.get("sys/version").await?,
        };
        self.version = reply["entries"]
            .as_object()
            .and_then(|entries| entries.values().next())
            .and_then(|entry| entry["nestedStats"]["entries"]["Version"]["description"].as_str())
            .map(str::to_string);
        info!("[{}] BIG-IP version {:?}", self.host_id, self.version);
        Ok(())
    }

    async fn collect(&mut self, command: &str) -> Result<Vec<MetricPoint>, DeviceError> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        let reply = self.get(command).await?;
        match reply.get("entries").and_then(Value::as_object) {
            Some(entries) => stats_points(&self.host_id, command, entries),
            None => Ok(reply_to_points(&self.host_id, command, &reply)?),
        }
    }
}
