//! The invocation orchestrator.
//!
//! Builds signed invocation envelopes and dispatches them in strict
//! sequence. The critical mechanism is the signing mutex: without it, two
//! logically-concurrent `invoke` calls could observe the same "next nonce"
//! and double-send colliding sequence numbers.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use octra_capabilities::{Capability, NonceManager, SignedInvocation};
use octra_core::{
    InvocationPayload, InvokeParams, MessageKind, Origin, ProtocolError, ProtocolResult,
    RequestEnvelope, Transport,
};

use crate::provider::wrap_provider_error;

/// Session coordinates stamped into every envelope header.
#[derive(Debug, Clone)]
struct SessionState {
    branch_id: String,
    epoch: u64,
}

/// Serializes invocation signing and manages optimistic nonce advance.
pub struct InvocationOrchestrator {
    transport: Arc<dyn Transport>,
    nonces: Arc<NonceManager>,
    /// All signing goes through here; each invoke fully completes before
    /// the next acquires a nonce.
    signing_lock: tokio::sync::Mutex<()>,
    session: RwLock<SessionState>,
}

impl InvocationOrchestrator {
    /// Create an orchestrator over a transport and a nonce table.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, nonces: Arc<NonceManager>) -> Self {
        Self {
            transport,
            nonces,
            signing_lock: tokio::sync::Mutex::new(()),
            session: RwLock::new(SessionState {
                branch_id: "main".to_string(),
                epoch: 0,
            }),
        }
    }

    /// Update the active branch (from a `branchChanged` push).
    pub fn set_branch(&self, branch_id: impl Into<String>) {
        if let Ok(mut session) = self.session.write() {
            session.branch_id = branch_id.into();
        }
    }

    /// Update the active epoch (from an `epochChanged` push).
    pub fn set_epoch(&self, epoch: u64) {
        if let Ok(mut session) = self.session.write() {
            session.epoch = epoch;
        }
    }

    /// Invoke a method under a capability.
    ///
    /// Holds the signing lock for the whole critical section: precondition
    /// checks, nonce advance, envelope build, dispatch, and (on failure)
    /// nonce rollback. Successful calls strictly advance the capability's
    /// nonce watermark; failed dispatches leave it unchanged so a retry
    /// reuses the just-failed sequence number.
    ///
    /// # Errors
    ///
    /// Returns the specific precondition violation
    /// ([`ProtocolError::CapabilityExpired`], [`ProtocolError::OriginMismatch`],
    /// [`ProtocolError::ScopeViolation`]) or the wrapped dispatch failure.
    pub async fn invoke(
        &self,
        capability: &Capability,
        origin: &Origin,
        method: &str,
        payload: Option<InvocationPayload>,
    ) -> ProtocolResult<Value> {
        let _guard = self.signing_lock.lock().await;

        // Preconditions come before the nonce advance: a refused call must
        // not burn a sequence number.
        if capability.is_expired() {
            return Err(ProtocolError::CapabilityExpired);
        }
        if capability.app_origin != *origin {
            return Err(origin.mismatch(&capability.app_origin));
        }
        if !capability.allows_method(method) {
            return Err(ProtocolError::ScopeViolation {
                method: method.to_string(),
            });
        }

        let nonce = self
            .nonces
            .next_nonce(capability.id)
            .map_err(ProtocolError::from)?;

        let (branch_id, epoch) = {
            let session = self
                .session
                .read()
                .map_err(|e| ProtocolError::transport(e.to_string()))?;
            (session.branch_id.clone(), session.epoch)
        };

        let invocation = SignedInvocation::build(
            &capability.circle,
            origin,
            epoch,
            &branch_id,
            capability.id,
            method,
            nonce,
            payload.as_ref(),
        );

        let result = self
            .dispatch(capability, origin, method, &invocation, payload)
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                // Failed dispatch: give the sequence number back.
                if let Err(rollback_err) = self.nonces.rollback(capability.id, nonce) {
                    tracing::warn!(%rollback_err, "nonce rollback failed");
                }
                Err(wrap_provider_error(error))
            }
        }
    }

    async fn dispatch(
        &self,
        capability: &Capability,
        origin: &Origin,
        method: &str,
        invocation: &SignedInvocation,
        payload: Option<InvocationPayload>,
    ) -> ProtocolResult<Value> {
        let params = InvokeParams {
            app_origin: origin.clone(),
            capability_id: capability.id,
            method: method.to_string(),
            invocation: serde_json::to_value(invocation)
                .map_err(|e| ProtocolError::validation(e.to_string()))?,
            payload: payload.map(|p| p.to_wire()),
        };
        let envelope = RequestEnvelope::page(MessageKind::InvokeRequest, &params)?;
        let response = self.transport.send(envelope).await?;
        response.into_result()
    }
}

impl std::fmt::Debug for InvocationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationOrchestrator").finish_non_exhaustive()
    }
}
