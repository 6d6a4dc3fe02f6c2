//! Sampled process values
//!
//! A [`DataValue`] is what an endpoint returns for one node: an optional
//! payload, a quality status, and the timestamps the server attached to the
//! sample. The bridge only handles numeric, boolean, and string payloads;
//! everything else is rejected by the validity rule before it can reach a
//! change channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A process value payload.
///
/// Numbers are carried as `f64` regardless of the endpoint's native width;
/// the bridge forwards values, it does not do arithmetic on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// A payload the bridge can forward: a non-NaN number, a bool, or a string.
    pub fn is_valid(&self) -> bool {
        match self {
            Value::Number(n) => !n.is_nan(),
            Value::Bool(_) | Value::Text(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// The declared type of a measurement's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean", alias = "bool")]
    Boolean,
    #[serde(rename = "string", alias = "text")]
    Text,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "string",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample quality as reported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueStatus {
    #[default]
    Good,
    Uncertain,
    Bad,
}

impl ValueStatus {
    pub fn is_good(&self) -> bool {
        matches!(self, ValueStatus::Good)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueStatus::Good => "Good",
            ValueStatus::Uncertain => "Uncertain",
            ValueStatus::Bad => "Bad",
        }
    }
}

/// One sample for one node, as returned by a read or pushed by a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Option<Value>,
    #[serde(default)]
    pub status: ValueStatus,
    #[serde(default)]
    pub source_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataValue {
    /// A good-quality sample stamped with the current time.
    pub fn good(value: impl Into<Value>) -> Self {
        let now = Utc::now();
        Self {
            value: Some(value.into()),
            status: ValueStatus::Good,
            source_timestamp: Some(now),
            server_timestamp: Some(now),
        }
    }

    /// A sample with no usable payload.
    pub fn bad() -> Self {
        Self {
            value: None,
            status: ValueStatus::Bad,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// Whether this sample may be forwarded at all.
    ///
    /// A bad status with no usable payload is invalid; a payload that is not
    /// a non-NaN number, a bool, or a string is invalid. Invalid samples are
    /// dropped by the pumps and never update a point's accepted baseline.
    pub fn is_valid(&self) -> bool {
        self.value.as_ref().is_some_and(Value::is_valid)
    }

    /// The payload, if this sample passes the validity rule.
    pub fn valid_value(&self) -> Option<&Value> {
        self.value.as_ref().filter(|v| v.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_number_is_invalid() {
        let sample = DataValue::good(f64::NAN);
        assert!(!sample.is_valid());
        assert!(sample.valid_value().is_none());
    }

    #[test]
    fn string_payload_is_valid() {
        assert!(DataValue::good("open").is_valid());
    }

    #[test]
    fn bool_payload_is_valid() {
        assert!(DataValue::good(true).is_valid());
    }

    #[test]
    fn missing_payload_is_invalid() {
        assert!(!DataValue::bad().is_valid());
    }

    #[test]
    fn finite_number_is_valid() {
        let sample = DataValue::good(10.6);
        assert_eq!(sample.valid_value(), Some(&Value::Number(10.6)));
    }

    #[test]
    fn value_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Value::Number(1.5)).unwrap(), "1.5");
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_string(&Value::Text("open".into())).unwrap(),
            "\"open\""
        );
    }
}
