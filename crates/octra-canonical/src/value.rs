//! The canonical value model.

use std::collections::BTreeMap;

use serde_json::Number;

use crate::error::{CanonicalError, CanonicalResult};

/// A value in the canonical data model.
///
/// Maps are backed by [`BTreeMap`], so key order is always ascending by code
/// point regardless of insertion order. Byte sequences are first-class
/// (rendered as `0x`-hex), unlike in plain JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Absent / null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Finite number (integer or decimal).
    Number(Number),
    /// UTF-8 string.
    String(String),
    /// Owned byte sequence.
    Bytes(Vec<u8>),
    /// Ordered sequence; element order is significant and preserved.
    Array(Vec<Value>),
    /// Keyed map; keys are kept sorted.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a number from a float.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::NonFiniteNumber`] for NaN or infinities;
    /// those have no canonical rendering and must never reach a signer.
    pub fn number_f64(n: f64) -> CanonicalResult<Self> {
        Number::from_f64(n)
            .map(Value::Number)
            .ok_or(CanonicalError::NonFiniteNumber)
    }

    /// Build a map from key-value pairs. Later duplicate keys win.
    #[must_use]
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Convert from a `serde_json` value.
    ///
    /// Objects become sorted maps; numbers pass through unchanged (JSON
    /// cannot carry non-finite numbers, so this conversion is total).
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(Number::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}
