//! Line-oriented wire format for metric points.
//!
//! `measurement[,tag=value...] field=value[,field=value...]`
//!
//! Nothing is escaped: producers must not put spaces, commas or `=` in keys
//! and values.

use crate::models::MetricPoint;

pub fn encode(point: &MetricPoint) -> String {
    let mut line = String::from(point.measurement());

    for (key, value) in point.tags() {
        line.push(',');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }

    line.push(' ');
    let fields: Vec<String> = point
        .fields()
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    line.push_str(&fields.join(","));

    line
}

pub fn encode_all(points: &[MetricPoint]) -> Vec<String> {
    points.iter().map(encode).collect()
}
