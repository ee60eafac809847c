//! Capability error types.

use octra_core::ProtocolError;
use thiserror::Error;

/// Errors that can occur in capability handling.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No capability with this id is known.
    #[error("capability not found: {id}")]
    NotFound {
        /// The missing capability id, stringified.
        id: String,
    },

    /// The capability's expiry time has passed.
    #[error("capability expired: {id}")]
    Expired {
        /// The expired capability id, stringified.
        id: String,
    },

    /// The capability was explicitly revoked.
    #[error("capability revoked: {id}")]
    Revoked {
        /// The revoked capability id, stringified.
        id: String,
    },

    /// The capability's signature does not verify.
    #[error("capability signature verification failed")]
    SignatureInvalid,

    /// The capability is bound to a different origin than the presenter's.
    #[error("capability origin mismatch: bound to {bound}, presented by {presenter}")]
    OriginMismatch {
        /// The origin embedded in the capability.
        bound: String,
        /// The origin presenting the capability.
        presenter: String,
    },

    /// The invoked method is not in the granted set.
    #[error("method not granted: {method}")]
    MethodNotGranted {
        /// The method that was attempted.
        method: String,
    },

    /// Per-origin capability limit reached and eviction is disabled.
    #[error("capability capacity exceeded for {origin} (limit {limit})")]
    CapacityExceeded {
        /// The origin at capacity.
        origin: String,
        /// The configured limit.
        limit: usize,
    },

    /// Replay or out-of-order invocation nonce.
    #[error("nonce violation: got {got}, last accepted {last_accepted}")]
    NonceViolation {
        /// The highest nonce already accepted.
        last_accepted: u64,
        /// The nonce that was presented.
        got: u64,
    },

    /// A timestamp fell outside the representable range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A table lock was poisoned.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<CapabilityError> for ProtocolError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::NotFound { id } => ProtocolError::Capability {
                reason: format!("not found: {id}"),
            },
            CapabilityError::Expired { .. } => ProtocolError::CapabilityExpired,
            CapabilityError::Revoked { .. } => ProtocolError::CapabilityRevoked,
            CapabilityError::SignatureInvalid => ProtocolError::SignatureInvalid,
            CapabilityError::OriginMismatch { bound, presenter } => ProtocolError::OriginMismatch {
                claimed: presenter,
                actual: bound,
            },
            CapabilityError::MethodNotGranted { method } => {
                ProtocolError::ScopeViolation { method }
            }
            CapabilityError::CapacityExceeded { origin, limit } => {
                ProtocolError::CapacityExceeded { origin, limit }
            }
            CapabilityError::NonceViolation { last_accepted, got } => {
                ProtocolError::NonceViolation { last_accepted, got }
            }
            CapabilityError::InvalidTimestamp(reason) => ProtocolError::Validation { reason },
            CapabilityError::Storage(reason) => ProtocolError::Transport { reason },
        }
    }
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;
