//! Chunk metadata restricted to the primitive kinds the vector index stores natively

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Flat metadata map. Ordered so serialized payloads are stable across runs.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A primitive metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            MetadataValue::Bool(b) => Value::Bool(*b),
            MetadataValue::Integer(i) => Value::from(*i),
            MetadataValue::Float(f) => Value::from(*f),
            MetadataValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{}", b),
            MetadataValue::Integer(i) => write!(f, "{}", i),
            MetadataValue::Float(x) => write!(f, "{}", x),
            MetadataValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Map arbitrary JSON metadata onto primitive values.
///
/// - strings, booleans and numbers are kept (integers when they fit in `i64`)
/// - nested objects are flattened into dotted keys (`coordinates.system`)
/// - arrays are stored as their compact JSON text
/// - nulls are dropped
pub fn normalize_metadata(raw: &Map<String, Value>) -> Metadata {
    let mut out = Metadata::new();
    for (key, value) in raw {
        flatten_into(&mut out, key.clone(), value);
    }
    out
}

fn flatten_into(out: &mut Metadata, key: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            out.insert(key, MetadataValue::Bool(*b));
        }
        Value::Number(n) => {
            let v = match n.as_i64() {
                Some(i) => MetadataValue::Integer(i),
                None => match n.as_f64() {
                    Some(f) => MetadataValue::Float(f),
                    None => MetadataValue::String(n.to_string()),
                },
            };
            out.insert(key, v);
        }
        Value::String(s) => {
            out.insert(key, MetadataValue::String(s.clone()));
        }
        Value::Array(_) => {
            out.insert(key, MetadataValue::String(value.to_string()));
        }
        Value::Object(map) => {
            for (child, child_value) in map {
                flatten_into(out, format!("{}.{}", key, child), child_value);
            }
        }
    }
}

/// Read a chunk number written either as an integer or as a numeric string.
pub fn parse_chunk_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
