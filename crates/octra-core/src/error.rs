//! The protocol error taxonomy.
//!
//! Every failure that crosses the wire is one of these variants. The broker
//! serializes them into response envelopes; the provider folds raw transport
//! failures into them so callers never pattern-match on transport strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced anywhere in the capability authorization protocol.
///
/// Variants are serializable because they travel inside
/// [`ResponseEnvelope`](crate::ResponseEnvelope).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolError {
    /// The wallet provider is not present in this page.
    #[error("wallet provider is not installed")]
    NotInstalled,

    /// No approved connection exists for the calling origin.
    #[error("no connection for this origin")]
    NotConnected,

    /// The user explicitly rejected the request.
    #[error("request rejected by the user")]
    UserRejected,

    /// The request was not resolved within its class timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Time awaited before timeout, in milliseconds.
        timeout_ms: u64,
    },

    /// Malformed request shape, rejected before any dispatch.
    #[error("invalid request: {reason}")]
    Validation {
        /// What was wrong with the request.
        reason: String,
    },

    /// A capability-level failure not covered by a more specific variant.
    #[error("capability error: {reason}")]
    Capability {
        /// What went wrong.
        reason: String,
    },

    /// The capability's expiry time has passed.
    #[error("capability has expired")]
    CapabilityExpired,

    /// The capability was explicitly revoked.
    #[error("capability has been revoked")]
    CapabilityRevoked,

    /// The invoked method is not in the capability's granted method set.
    #[error("method not granted by capability: {method}")]
    ScopeViolation {
        /// The method that was attempted.
        method: String,
    },

    /// The claimed origin disagrees with the independently derived one,
    /// or a capability is bound to a different origin than the caller's.
    #[error("origin mismatch: claimed {claimed}, actual {actual}")]
    OriginMismatch {
        /// The origin the request claimed.
        claimed: String,
        /// The origin that was actually observed.
        actual: String,
    },

    /// Replay or out-of-order invocation nonce.
    #[error("nonce violation: got {got}, last accepted {last_accepted}")]
    NonceViolation {
        /// The highest nonce already accepted for the capability.
        last_accepted: u64,
        /// The nonce the invocation carried.
        got: u64,
    },

    /// A signature failed verification.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// The per-origin capability limit was reached and no entry could be
    /// evicted.
    #[error("capability capacity exceeded for {origin} (limit {limit})")]
    CapacityExceeded {
        /// The origin at capacity.
        origin: String,
        /// The configured per-origin limit.
        limit: usize,
    },

    /// A transport-level failure (relay unreachable, channel closed, ...).
    #[error("transport error: {reason}")]
    Transport {
        /// The underlying failure, already stringified.
        reason: String,
    },
}

impl ProtocolError {
    /// Shorthand for a [`ProtocolError::Validation`] error.
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ProtocolError::Transport`] error.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Whether this error indicates tampering or a defective counterparty.
    ///
    /// Security faults must be surfaced as warnings, not transient failures.
    #[must_use]
    pub fn is_security_fault(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid | Self::OriginMismatch { .. } | Self::NonceViolation { .. }
        )
    }

    /// Whether this error is an expected, recoverable outcome (user said no,
    /// or nobody answered in time) rather than a bug or an attack.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UserRejected | Self::Timeout { .. })
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
