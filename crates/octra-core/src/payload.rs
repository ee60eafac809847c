//! The tagged invocation payload variant.
//!
//! The transport layer historically received byte arrays in several duck-typed
//! shapes (hex strings, plain number arrays, wrapped typed arrays). All of
//! them are decoded exactly once, here, into [`InvocationPayload`]; nothing
//! downstream ever re-sniffs a payload's shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// A per-invocation payload, decoded once at the wire boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationPayload {
    /// Plaintext bytes, owned.
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    /// Opaque ciphertext. Never inspected, coerced, or logged - only hashed.
    Opaque {
        /// Encryption scheme identifier (e.g. an FHE scheme tag).
        scheme: String,
        /// The ciphertext blob.
        #[serde(with = "hex_bytes")]
        ciphertext: Vec<u8>,
        /// Transport hints for the executor. Not part of the hash input.
        #[serde(default)]
        metadata: Value,
    },
}

impl InvocationPayload {
    /// Whether this payload must stay opaque.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque { .. })
    }

    /// The bytes that get hashed into the invocation envelope.
    ///
    /// Opaque payloads contribute their ciphertext as-is; the scheme tag and
    /// metadata are transport concerns, not signed content.
    #[must_use]
    pub fn hash_input(&self) -> &[u8] {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Opaque { ciphertext, .. } => ciphertext,
        }
    }

    /// Decode a payload from its wire representation.
    ///
    /// Accepted forms:
    /// - `"0x<hex>"` string -> [`InvocationPayload::Bytes`]
    /// - array of integers 0-255 -> [`InvocationPayload::Bytes`]
    /// - `{"scheme": ..., "ciphertext": "0x<hex>", "metadata": ...}` ->
    ///   [`InvocationPayload::Opaque`]
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] for any other shape.
    pub fn from_wire(value: &Value) -> ProtocolResult<Self> {
        match value {
            Value::String(s) => {
                let bytes = decode_hex(s)?;
                Ok(Self::Bytes(bytes))
            }
            Value::Array(items) => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in items {
                    let n = item.as_u64().filter(|n| *n <= 255).ok_or_else(|| {
                        ProtocolError::validation("payload array elements must be bytes (0-255)")
                    })?;
                    // Bounds checked above.
                    #[allow(clippy::cast_possible_truncation)]
                    bytes.push(n as u8);
                }
                Ok(Self::Bytes(bytes))
            }
            Value::Object(map) => {
                let scheme = map
                    .get("scheme")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ProtocolError::validation("opaque payload missing scheme"))?;
                let ciphertext = map
                    .get("ciphertext")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ProtocolError::validation("opaque payload missing ciphertext")
                    })?;
                Ok(Self::Opaque {
                    scheme: scheme.to_string(),
                    ciphertext: decode_hex(ciphertext)?,
                    metadata: map.get("metadata").cloned().unwrap_or(Value::Null),
                })
            }
            _ => Err(ProtocolError::validation(
                "payload must be a hex string, byte array, or opaque object",
            )),
        }
    }

    /// Encode this payload into its canonical wire representation.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
            Self::Opaque {
                scheme,
                ciphertext,
                metadata,
            } => serde_json::json!({
                "scheme": scheme,
                "ciphertext": format!("0x{}", hex::encode(ciphertext)),
                "metadata": metadata,
            }),
        }
    }
}

fn decode_hex(s: &str) -> ProtocolResult<Vec<u8>> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped)
        .map_err(|e| ProtocolError::validation(format!("invalid hex payload: {e}")))
}

mod hex_bytes {
    //! Serde adapter: byte vectors as `0x`-prefixed hex strings.

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(stripped).map_err(serde::de::Error::custom)
    }
}
