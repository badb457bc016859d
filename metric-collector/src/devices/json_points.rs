//! Generic mapping of a JSON device reply to metric points.
//!
//! Numeric leaves (and strings holding a number) become fields keyed by
//! their dotted path. Wrapper keys that only add nesting are left out of
//! the path.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{FieldValue, MetricPoint, PointError};

const WRAPPER_KEYS: &[&str] = &["attributes", "data", "entries", "nestedStats", "value"];

/// `"show interfaces extensive"` -> `"show_interfaces_extensive"`
pub fn measurement_name(command: &str) -> String {
    let mut name = String::with_capacity(command.len());
    for c in command.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    name.trim_matches('_').to_string()
}

/// Replaces the characters the line format cannot carry unescaped.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() || c == ',' || c == '=' { '_' } else { c })
        .collect()
}

pub fn numeric_fields(value: &Value) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    walk(value, &mut Vec::new(), &mut fields);
    fields
}

fn walk(value: &Value, path: &mut Vec<String>, out: &mut BTreeMap<String, FieldValue>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if WRAPPER_KEYS.contains(&key.as_str()) {
                    walk(child, path, out);
                } else {
                    path.push(sanitize(key));
                    walk(child, path, out);
                    path.pop();
                }
            }
        }
        Value::Array(items) if items.len() == 1 => walk(&items[0], path, out),
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(i.to_string());
                walk(child, path, out);
                path.pop();
            }
        }
        Value::Number(n) => {
            let field = match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => FieldValue::Float(f),
                    None => return,
                },
            };
            out.insert(field_key(path), field);
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                out.insert(field_key(path), FieldValue::Int(i));
            } else if let Ok(f) = s.parse::<f64>() {
                if f.is_finite() {
                    out.insert(field_key(path), FieldValue::Float(f));
                }
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}

fn field_key(path: &[String]) -> String {
    if path.is_empty() {
        "value".to_string()
    } else {
        path.join(".")
    }
}

/// One point for the whole reply, or none when it holds no numbers.
pub fn reply_to_points(
    host_id: &str,
    command: &str,
    reply: &Value,
) -> Result<Vec<MetricPoint>, PointError> {
    let fields = numeric_fields(reply);
    if fields.is_empty() {
        return Ok(Vec::new());
    }
    let tags = BTreeMap::from([("device".to_string(), host_id.to_string())]);
    Ok(vec![MetricPoint::new(measurement_name(command), tags, fields)?])
}
