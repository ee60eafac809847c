//! Permission scopes and network tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Coarse-grained permission tier granted by a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Read-only access to circle state.
    Read,
    /// May mutate circle state.
    Write,
    /// May submit compute jobs over (possibly encrypted) circle state.
    Compute,
}

impl Scope {
    /// Every tier includes read access.
    #[must_use]
    pub fn permits_read(&self) -> bool {
        true
    }

    /// Whether this tier permits state mutation.
    #[must_use]
    pub fn permits_write(&self) -> bool {
        matches!(self, Self::Write | Self::Compute)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Compute => write!(f, "compute"),
        }
    }
}

impl FromStr for Scope {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "compute" => Ok(Self::Compute),
            other => Err(ProtocolError::validation(format!(
                "unknown scope: {other:?}"
            ))),
        }
    }
}

/// Chain network tag (e.g. `mainnet`, `testnet`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network(String);

impl Network {
    /// Create a network tag.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new("mainnet")
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse_display() {
        for s in ["read", "write", "compute"] {
            let scope: Scope = s.parse().unwrap();
            assert_eq!(scope.to_string(), s);
        }
        assert!("admin".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_permits() {
        assert!(Scope::Read.permits_read());
        assert!(Scope::Compute.permits_read());
        assert!(!Scope::Read.permits_write());
        assert!(Scope::Write.permits_write());
        assert!(Scope::Compute.permits_write());
    }

    #[test]
    fn test_scope_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Scope::Compute).unwrap(), "\"compute\"");
    }
}
