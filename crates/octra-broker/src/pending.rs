//! Request-id-keyed registry of one-shot approval channels.
//!
//! Each outstanding request owns exactly one entry. Resolution and timeout
//! race by removing the entry first; whoever removes it wins, so a promise
//! is never resolved twice and a verdict arriving after the timeout is
//! silently dropped.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;

use octra_core::{ProtocolError, ProtocolResult, RequestId};

use crate::approval::ApprovalVerdict;

/// Request classes with their hard timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Page-wallet connection approval.
    Connection,
    /// Capability grant approval.
    CapabilityGrant,
    /// Invocation approval.
    Invocation,
}

impl RequestClass {
    /// The hard timeout for this class.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Connection => Duration::from_secs(60),
            Self::CapabilityGrant | Self::Invocation => Duration::from_secs(300),
        }
    }

    /// The storage key under which this class's pending record is stashed.
    #[must_use]
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Connection => "pending:connection",
            Self::CapabilityGrant => "pending:capability",
            Self::Invocation => "pending:invocation",
        }
    }
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::CapabilityGrant => write!(f, "capability_grant"),
            Self::Invocation => write!(f, "invocation"),
        }
    }
}

/// The registry of outstanding approval requests.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: DashMap<RequestId, oneshot::Sender<ApprovalVerdict>>,
}

impl PendingRequests {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and get the channel its verdict will arrive on.
    ///
    /// Registering the same id twice replaces the earlier entry; its
    /// receiver resolves with a channel-closed error.
    #[must_use]
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<ApprovalVerdict> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id, tx);
        rx
    }

    /// Deliver a verdict to the matching pending request.
    ///
    /// Returns `false` if no entry exists (already resolved or timed out);
    /// the verdict is dropped in that case.
    pub fn resolve(&self, id: RequestId, verdict: ApprovalVerdict) -> bool {
        match self.entries.remove(&id) {
            Some((_, tx)) => tx.send(verdict).is_ok(),
            None => {
                tracing::debug!(request = %id, "dropping verdict for unknown or timed-out request");
                false
            }
        }
    }

    /// Remove an entry without delivering anything (timeout path).
    ///
    /// Returns `false` if the entry was already gone.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Whether a request is still outstanding.
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Await a registered verdict with a hard timeout.
    ///
    /// On timeout the entry is removed and [`ProtocolError::Timeout`] is
    /// synthesized; a verdict arriving afterwards finds no entry and is
    /// dropped by [`PendingRequests::resolve`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Timeout`] when the timer fires first, or
    /// [`ProtocolError::Transport`] if the sender was dropped.
    pub async fn await_verdict(
        &self,
        id: RequestId,
        rx: oneshot::Receiver<ApprovalVerdict>,
        timeout: Duration,
    ) -> ProtocolResult<ApprovalVerdict> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(_)) => {
                self.cancel(id);
                Err(ProtocolError::transport("approval channel closed"))
            }
            Err(_) => {
                self.cancel(id);
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(request = %id, timeout_ms, "approval timed out");
                Err(ProtocolError::Timeout { timeout_ms })
            }
        }
    }
}
