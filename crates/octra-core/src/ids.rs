//! Typed identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ProtocolError, ProtocolResult};

/// Unique identifier for an issued capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityId(pub Uuid);

impl CapabilityId {
    /// Create a new random capability ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CapabilityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cap:{}", self.0)
    }
}

/// Unique identifier correlating a request with its response across contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Identifier of an approved page-wallet connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess:{}", self.0)
    }
}

/// Logical namespace a capability is scoped to.
///
/// Circle ids are free-form but never empty; an empty id is a validation
/// error raised before any dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircleId(String);

impl CircleId {
    /// Create a circle ID, rejecting empty or whitespace-only input.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] if the id is empty.
    pub fn new(id: impl Into<String>) -> ProtocolResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ProtocolError::validation("circle id must not be empty"));
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CircleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CircleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(CapabilityId::new(), CapabilityId::new());
        assert_ne!(RequestId::new(), RequestId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_display_prefixes() {
        assert!(CapabilityId::new().to_string().starts_with("cap:"));
        assert!(RequestId::new().to_string().starts_with("req:"));
        assert!(SessionId::new().to_string().starts_with("sess:"));
    }

    #[test]
    fn test_circle_id_rejects_empty() {
        assert!(CircleId::new("demo").is_ok());
        assert!(matches!(
            CircleId::new(""),
            Err(ProtocolError::Validation { .. })
        ));
        assert!(matches!(
            CircleId::new("   "),
            Err(ProtocolError::Validation { .. })
        ));
    }

    #[test]
    fn test_circle_id_serde_transparent() {
        let circle = CircleId::new("demo").unwrap();
        let json = serde_json::to_string(&circle).unwrap();
        assert_eq!(json, "\"demo\"");
    }
}
