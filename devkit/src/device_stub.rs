/*!
Scripted device drivers for tests without real equipment.

A [`ScriptedFleet`] describes how each host behaves (reachable or not,
which commands fail, which ones panic) and records every command that was
actually sent, in order, per host.
*/

use async_trait::async_trait;
use metric_collector::devices::{DeviceDriver, DeviceError, DriverRegistry, DriverSettings};
use metric_collector::models::{FieldValue, MetricPoint};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub const REPLY_MEASUREMENT: &str = "scripted_reply";

#[derive(Debug, Clone, Default)]
pub struct DeviceScript {
    pub unreachable: bool,
    pub failing: HashSet<String>,
    pub panicking: HashSet<String>,
}

/// Calls recorded as `(host, command)` in the order they happened.
pub type CallLog = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Clone, Default)]
pub struct ScriptedFleet {
    scripts: Arc<Mutex<HashMap<String, DeviceScript>>>,
    calls: CallLog,
}

impl ScriptedFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(self, host: &str) -> Self {
        self.scripts.lock().entry(host.to_string()).or_default().unreachable = true;
        self
    }

    pub fn failing(self, host: &str, command: &str) -> Self {
        self.scripts
            .lock()
            .entry(host.to_string())
            .or_default()
            .failing
            .insert(command.to_string());
        self
    }

    pub fn panicking(self, host: &str, command: &str) -> Self {
        self.scripts
            .lock()
            .entry(host.to_string())
            .or_default()
            .panicking
            .insert(command.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, host: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Registry answering for every listed device type with a scripted driver.
    pub fn registry(&self, device_types: &[&str]) -> DriverRegistry {
        let mut registry = DriverRegistry::new(DriverSettings::default());
        for device_type in device_types {
            let fleet = self.clone();
            registry.register(*device_type, move |target, _| {
                let script = fleet.scripts.lock().get(&target.host_id).cloned().unwrap_or_default();
                Ok(Box::new(ScriptedDevice::new(&target.host_id, script, fleet.calls.clone()))
                    as Box<dyn DeviceDriver>)
            });
        }
        registry
    }
}

pub struct ScriptedDevice {
    host_id: String,
    script: DeviceScript,
    calls: CallLog,
    connected: bool,
}

impl ScriptedDevice {
    pub fn new(host_id: &str, script: DeviceScript, calls: CallLog) -> Self {
        Self { host_id: host_id.to_string(), script, calls, connected: false }
    }
}

#[async_trait]
impl DeviceDriver for ScriptedDevice {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.script.unreachable {
            return Err(DeviceError::Failed(format!("{} does not answer", self.host_id)));
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn collect_facts(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn collect(&mut self, command: &str) -> Result<Vec<MetricPoint>, DeviceError> {
        self.calls.lock().push((self.host_id.clone(), command.to_string()));
        if self.script.panicking.contains(command) {
            panic!("scripted panic on {} '{}'", self.host_id, command);
        }
        if self.script.failing.contains(command) {
            return Err(DeviceError::Failed(format!("scripted failure for '{command}'")));
        }
        let tags = BTreeMap::from([
            ("device".to_string(), self.host_id.clone()),
            ("command".to_string(), command.replace(' ', "_")),
        ]);
        let fields = BTreeMap::from([("value".to_string(), FieldValue::Int(1))]);
        Ok(vec![MetricPoint::new(REPLY_MEASUREMENT, tags, fields)?])
    }
}
