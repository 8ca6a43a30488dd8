//! Typed time-series telemetry entries.
//!
//! Inbound device payloads arrive as raw JSON. The transport-facing layer
//! converts them into [`TsKvEntry`] values once, so the rule engine and the
//! alarm evaluator never have to re-parse the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// The coarse data type of a telemetry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Long,
    Double,
    String,
    Json,
}

/// A single typed telemetry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KvValue {
    Bool(bool),
    Long(i64),
    Double(f64),
    Str(String),
    /// Nested objects and arrays are kept as their JSON text.
    Json(String),
}

impl KvValue {
    pub fn data_type(&self) -> DataType {
        match self {
            KvValue::Bool(_) => DataType::Boolean,
            KvValue::Long(_) => DataType::Long,
            KvValue::Double(_) => DataType::Double,
            KvValue::Str(_) => DataType::String,
            KvValue::Json(_) => DataType::Json,
        }
    }
}

/// A timestamped key/value telemetry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsKvEntry {
    /// Unix millisecond timestamp of the sample.
    pub ts: i64,
    pub key: String,
    pub value: KvValue,
}

impl TsKvEntry {
    pub fn new(ts: i64, key: impl Into<String>, value: KvValue) -> Self {
        Self {
            ts,
            key: key.into(),
            value,
        }
    }

    /// Numeric view of the value. Long and Double entries coerce, everything
    /// else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            KvValue::Long(v) => Some(*v as f64),
            KvValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            KvValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            KvValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            KvValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Transport metadata fields that never become telemetry entries.
const TRANSPORT_FIELDS: [&str; 4] = ["timestamp", "deviceId", "deviceName", "sendTimeNanos"];

/// Parse a raw JSON device payload into typed telemetry entries.
///
/// A top-level `timestamp` field overrides `default_ts` for every entry.
/// Transport bookkeeping fields are skipped, nested objects and arrays are
/// preserved as [`KvValue::Json`]. A malformed payload yields no entries; the
/// caller decides whether the raw payload is still worth forwarding.
pub fn parse_payload(payload: &str, default_ts: i64) -> Vec<TsKvEntry> {
    let map = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("telemetry payload is not a JSON object, ignoring");
            return Vec::new();
        }
        Err(err) => {
            warn!("failed to parse telemetry payload: {err}");
            return Vec::new();
        }
    };

    let ts = map
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or(default_ts);

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in &map {
        if TRANSPORT_FIELDS.contains(&key.as_str()) {
            continue;
        }

        let kv = match value {
            Value::Null => continue,
            Value::Bool(b) => KvValue::Bool(*b),
            Value::Number(n) => {
                if let Some(l) = n.as_i64() {
                    KvValue::Long(l)
                } else if let Some(d) = n.as_f64() {
                    KvValue::Double(d)
                } else {
                    continue;
                }
            }
            Value::String(s) => KvValue::Str(s.clone()),
            Value::Object(_) | Value::Array(_) => KvValue::Json(value.to_string()),
        };

        entries.push(TsKvEntry::new(ts, key.clone(), kv));
    }

    entries
}
