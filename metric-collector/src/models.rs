//! Metric points and the statistics records folded into them.
//!
//! A [`MetricPoint`] is the only thing that flows from device drivers to the
//! sinks. Tags and fields live in ordered maps so a given point always
//! encodes to the same line.

use std::collections::BTreeMap;
use std::fmt;

pub const HOST_STATS_MEASUREMENT: &str = "jnpr_netconf_collector_stats";
pub const RUN_STATS_MEASUREMENT: &str = "jnpr_metric_collector_stats_agent";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PointError {
    #[error("measurement name is empty")]
    EmptyMeasurement,
    #[error("point '{0}' has no fields")]
    NoFields(String),
}

/// Scalar carried by a field.
///
/// `Text` is written verbatim, which is how producers hand over numbers they
/// already formatted (e.g. `"0.1250"`).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One measurement with its tags and fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    measurement: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
}

impl MetricPoint {
    /// Builds a point, refusing an empty measurement or an empty field set.
    pub fn new(
        measurement: impl Into<String>,
        tags: BTreeMap<String, String>,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<Self, PointError> {
        let measurement = measurement.into();
        if measurement.is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if fields.is_empty() {
            return Err(PointError::NoFields(measurement));
        }
        Ok(Self { measurement, tags, fields })
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Sets a tag, replacing any previous value for the key.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds context tags whose keys the point does not already carry.
    pub fn with_context<'a, I>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in context {
            self.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self
    }
}

/// Counters gathered while one host goes through its pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionStats {
    pub commands_total: u32,
    pub commands_ok: u32,
    pub commands_failed: u32,
    pub reachable: bool,
    pub elapsed_seconds: f64,
}

impl CollectionStats {
    pub fn record_success(&mut self) {
        self.commands_total += 1;
        self.commands_ok += 1;
    }

    pub fn record_failure(&mut self) {
        self.commands_total += 1;
        self.commands_failed += 1;
    }

    pub fn to_point(&self, host_id: &str) -> MetricPoint {
        let tags = BTreeMap::from([("device".to_string(), host_id.to_string())]);
        let fields = BTreeMap::from([
            ("execution_time_sec".to_string(), FieldValue::Text(format!("{:.4}", self.elapsed_seconds))),
            ("nbr_commands".to_string(), self.commands_total.into()),
            ("nbr_successful_commands".to_string(), self.commands_ok.into()),
            ("nbr_error_commands".to_string(), self.commands_failed.into()),
            ("reachable".to_string(), FieldValue::Int(i64::from(self.reachable))),
            ("unreachable".to_string(), FieldValue::Int(i64::from(!self.reachable))),
        ]);
        MetricPoint { measurement: HOST_STATS_MEASUREMENT.to_string(), tags, fields }
    }
}

/// Aggregate numbers for a whole run, emitted once after every unit joined.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub elapsed_seconds: f64,
    pub devices_selected: usize,
    /// Execution units actually started, reported as `nbr_threads`. This can
    /// be lower than the configured `--nbr-thread` when there are fewer
    /// hosts than units. `None` in sequential mode.
    pub threads_used: Option<usize>,
    pub shard_label: Option<String>,
}

impl RunStats {
    pub fn to_point(&self) -> MetricPoint {
        let mut tags = BTreeMap::new();
        if let Some(label) = &self.shard_label {
            tags.insert("sharding".to_string(), label.clone());
        }
        let mut fields = BTreeMap::from([
            ("execution_time_sec".to_string(), FieldValue::Text(format!("{:.4}", self.elapsed_seconds))),
            ("nbr_devices".to_string(), self.devices_selected.into()),
        ]);
        if let Some(threads) = self.threads_used {
            fields.insert("nbr_threads".to_string(), threads.into());
        }
        MetricPoint { measurement: RUN_STATS_MEASUREMENT.to_string(), tags, fields }
    }
}
