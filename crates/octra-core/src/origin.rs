//! Normalized web origins.
//!
//! Capabilities are cryptographically bound to the exact origin that
//! requested them, so origin comparison must be exact string equality over a
//! normalized form: lowercase `scheme://host[:port]`, no path, no userinfo.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// A normalized origin (`scheme://host[:port]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Parse and normalize an origin string.
    ///
    /// Accepts `scheme://host` or `scheme://host:port`; lowercases the
    /// result. Rejects input with a path, query, fragment, userinfo, or a
    /// missing scheme.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] on any malformed input.
    pub fn parse(input: &str) -> ProtocolResult<Self> {
        let input = input.trim();
        let Some((scheme, rest)) = input.split_once("://") else {
            return Err(ProtocolError::validation(format!(
                "origin missing scheme: {input:?}"
            )));
        };
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
            return Err(ProtocolError::validation(format!(
                "origin has invalid scheme: {input:?}"
            )));
        }
        if rest.is_empty() {
            return Err(ProtocolError::validation(format!(
                "origin missing host: {input:?}"
            )));
        }
        if rest.contains('/') || rest.contains('?') || rest.contains('#') {
            return Err(ProtocolError::validation(format!(
                "origin must not contain a path: {input:?}"
            )));
        }
        if rest.contains('@') {
            return Err(ProtocolError::validation(format!(
                "origin must not contain userinfo: {input:?}"
            )));
        }
        // host[:port]
        if let Some((host, port)) = rest.rsplit_once(':') {
            if host.is_empty() {
                return Err(ProtocolError::validation(format!(
                    "origin missing host: {input:?}"
                )));
            }
            if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                return Err(ProtocolError::validation(format!(
                    "origin has invalid port: {input:?}"
                )));
            }
        }
        Ok(Self(format!(
            "{}://{}",
            scheme.to_ascii_lowercase(),
            rest.to_ascii_lowercase()
        )))
    }

    /// The normalized origin string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An origin-mismatch error comparing this (actual) origin against a
    /// claimed one.
    #[must_use]
    pub fn mismatch(&self, claimed: &Origin) -> ProtocolError {
        ProtocolError::OriginMismatch {
            claimed: claimed.as_str().to_string(),
            actual: self.as_str().to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
