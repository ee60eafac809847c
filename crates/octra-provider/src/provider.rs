//! The page-injected provider object.

use std::sync::{Arc, RwLock};

use serde_json::Value;

use octra_capabilities::{Capability, CapabilitySpec, CapabilityStore, NonceManager};
use octra_core::{
    CapabilityId, CapabilityParams, CircleId, ConnectParams, Connection, DisconnectParams,
    InvocationPayload, MessageKind, Origin, ProtocolError, ProtocolResult, RequestEnvelope,
    Transport,
};

use crate::events::{EventEmitter, EventKind, ListenerId, WalletEvent};
use crate::orchestrator::InvocationOrchestrator;

/// Fold a transport-level failure into the protocol taxonomy.
///
/// Raw transport strings never surface to callers: known failure shapes map
/// to their specific variants, everything else stays a `Transport` error
/// with the original text preserved.
#[must_use]
pub fn wrap_provider_error(error: ProtocolError) -> ProtocolError {
    let ProtocolError::Transport { reason } = error else {
        return error;
    };
    let lowered = reason.to_lowercase();
    if lowered.contains("timed out") || lowered.contains("timeout") {
        ProtocolError::Timeout { timeout_ms: 0 }
    } else if lowered.contains("rejected") || lowered.contains("denied") {
        ProtocolError::UserRejected
    } else if lowered.contains("not connected") || lowered.contains("no connection") {
        ProtocolError::NotConnected
    } else if lowered.contains("not installed") {
        ProtocolError::NotInstalled
    } else {
        ProtocolError::Transport { reason }
    }
}

/// What a page sees as `window.octra`.
///
/// All methods return futures; events are delivered through the registered
/// listeners. The provider keeps a verified local mirror of its granted
/// capabilities, so a defective or malicious wallet handing back a tampered
/// capability is caught here, on the page side, before first use.
pub struct WalletProvider {
    transport: Arc<dyn Transport>,
    origin: Origin,
    app_name: String,
    app_icon: Option<String>,
    capabilities: CapabilityStore,
    nonces: Arc<NonceManager>,
    orchestrator: InvocationOrchestrator,
    events: EventEmitter,
    connection: RwLock<Option<Connection>>,
}

impl WalletProvider {
    /// Create a provider for a page at `origin`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        origin: Origin,
        app_name: impl Into<String>,
    ) -> Self {
        let nonces = Arc::new(NonceManager::new());
        Self {
            orchestrator: InvocationOrchestrator::new(
                Arc::clone(&transport),
                Arc::clone(&nonces),
            ),
            transport,
            origin,
            app_name: app_name.into(),
            app_icon: None,
            capabilities: CapabilityStore::new(),
            nonces,
            events: EventEmitter::new(),
            connection: RwLock::new(None),
        }
    }

    /// Set the icon shown on approval surfaces.
    #[must_use]
    pub fn with_icon(mut self, icon_url: impl Into<String>) -> Self {
        self.app_icon = Some(icon_url.into());
        self
    }

    /// The origin this provider is bound to.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The current connection, if any.
    #[must_use]
    pub fn connection(&self) -> Option<Connection> {
        self.connection.read().ok()?.clone()
    }

    /// Register an event listener.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    /// Remove an event listener.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.events.off(kind, id)
    }

    /// Request a connection to a circle.
    ///
    /// Resolves once the user approves (or the request fails); reconnecting
    /// while already connected resolves with the existing link.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UserRejected`], [`ProtocolError::Timeout`], or a
    /// wrapped transport failure.
    pub async fn connect(&self, circle: CircleId) -> ProtocolResult<Connection> {
        let params = ConnectParams {
            app_origin: self.origin.clone(),
            circle,
            app_name: self.app_name.clone(),
            app_icon: self.app_icon.clone(),
            network: None,
        };
        let envelope = RequestEnvelope::page(MessageKind::ConnectionRequest, &params)?;
        let response = self
            .transport
            .send(envelope)
            .await
            .map_err(wrap_provider_error)?;
        let connection: Connection = response.into_result().map_err(wrap_provider_error)?;

        if let Ok(mut slot) = self.connection.write() {
            *slot = Some(connection.clone());
        }
        self.events.emit(&WalletEvent::Connect(connection.clone()));
        Ok(connection)
    }

    /// Tear down the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] if there is nothing to tear
    /// down, or a wrapped transport failure.
    pub async fn disconnect(&self) -> ProtocolResult<()> {
        if self.connection().is_none() {
            return Err(ProtocolError::NotConnected);
        }
        let params = DisconnectParams {
            app_origin: self.origin.clone(),
        };
        let envelope = RequestEnvelope::page(MessageKind::DisconnectRequest, &params)?;
        let response = self
            .transport
            .send(envelope)
            .await
            .map_err(wrap_provider_error)?;
        let _: bool = response.into_result().map_err(wrap_provider_error)?;

        if let Ok(mut slot) = self.connection.write() {
            *slot = None;
        }
        self.events.emit(&WalletEvent::Disconnect {
            origin: self.origin.clone(),
        });
        Ok(())
    }

    /// Request a capability grant.
    ///
    /// Shape validation happens synchronously, before any dispatch. The
    /// returned capability is verified (signature, expiry, origin binding)
    /// and mirrored locally before this resolves.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Validation`] synchronously for a malformed spec;
    /// [`ProtocolError::NotConnected`], [`ProtocolError::UserRejected`],
    /// [`ProtocolError::Timeout`], [`ProtocolError::SignatureInvalid`], or
    /// a wrapped transport failure afterwards.
    pub async fn request_capability(&self, spec: CapabilitySpec) -> ProtocolResult<Capability> {
        spec.validate()?;
        if self.connection().is_none() {
            return Err(ProtocolError::NotConnected);
        }

        let params = CapabilityParams {
            app_origin: self.origin.clone(),
            circle: spec.circle.clone(),
            methods: spec.methods.clone(),
            scope: spec.scope,
            encrypted: spec.encrypted,
            ttl_ms: spec.ttl_ms,
            app_name: self.app_name.clone(),
            app_icon: self.app_icon.clone(),
        };
        let envelope = RequestEnvelope::page(MessageKind::CapabilityRequest, &params)?;
        let response = self
            .transport
            .send(envelope)
            .await
            .map_err(wrap_provider_error)?;
        let capability: Capability = response.into_result().map_err(wrap_provider_error)?;

        // Verified insertion: a wallet handing back a tampered or
        // mis-bound capability is a security fault, surfaced as such.
        if let Err(e) = self.capabilities.add(capability.clone(), &self.origin) {
            let err = ProtocolError::from(e);
            tracing::warn!(%err, "wallet returned an invalid capability");
            return Err(err);
        }
        self.nonces
            .reset(capability.id, capability.nonce)
            .map_err(ProtocolError::from)?;

        self.events
            .emit(&WalletEvent::CapabilityGranted(Box::new(capability.clone())));
        Ok(capability)
    }

    /// Invoke a method under a granted capability.
    ///
    /// # Errors
    ///
    /// The specific precondition violation, [`ProtocolError::NonceViolation`]
    /// from the wallet side, or a wrapped dispatch failure.
    pub async fn invoke(
        &self,
        capability_id: CapabilityId,
        method: &str,
        payload: Option<InvocationPayload>,
    ) -> ProtocolResult<Value> {
        let capability = self
            .capabilities
            .get(capability_id)
            .map_err(ProtocolError::from)?
            .ok_or(ProtocolError::Capability {
                reason: format!("not found: {capability_id}"),
            })?;

        self.orchestrator
            .invoke(&capability, &self.origin, method, payload)
            .await
    }

    /// Drop a capability locally and mark it revoked.
    ///
    /// # Errors
    ///
    /// Returns a wrapped storage failure.
    pub fn revoke_capability(&self, capability_id: CapabilityId) -> ProtocolResult<()> {
        self.capabilities
            .revoke(capability_id)
            .map_err(ProtocolError::from)?;
        self.nonces.forget(capability_id);
        self.events
            .emit(&WalletEvent::CapabilityRevoked(capability_id));
        Ok(())
    }

    /// Handle a `branchChanged` push from the wallet.
    pub fn notify_branch_changed(&self, branch_id: impl Into<String>) {
        let branch_id = branch_id.into();
        self.orchestrator.set_branch(branch_id.clone());
        self.events.emit(&WalletEvent::BranchChanged(branch_id));
    }

    /// Handle an `epochChanged` push from the wallet.
    pub fn notify_epoch_changed(&self, epoch: u64) {
        self.orchestrator.set_epoch(epoch);
        self.events.emit(&WalletEvent::EpochChanged(epoch));
    }
}

impl std::fmt::Debug for WalletProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletProvider")
            .field("origin", &self.origin)
            .field("connected", &self.connection().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_provider_error_known_shapes() {
        assert_eq!(
            wrap_provider_error(ProtocolError::transport("request timed out upstream")),
            ProtocolError::Timeout { timeout_ms: 0 }
        );
        assert_eq!(
            wrap_provider_error(ProtocolError::transport("user rejected the prompt")),
            ProtocolError::UserRejected
        );
        assert_eq!(
            wrap_provider_error(ProtocolError::transport("wallet not connected")),
            ProtocolError::NotConnected
        );
        assert_eq!(
            wrap_provider_error(ProtocolError::transport("provider not installed")),
            ProtocolError::NotInstalled
        );
    }

    #[test]
    fn test_wrap_provider_error_passthrough() {
        // Non-transport errors pass through untouched.
        assert_eq!(
            wrap_provider_error(ProtocolError::SignatureInvalid),
            ProtocolError::SignatureInvalid
        );
        // Unknown transport reasons stay transport errors, text preserved.
        let err = wrap_provider_error(ProtocolError::transport("socket reset"));
        assert_eq!(
            err,
            ProtocolError::Transport {
                reason: "socket reset".into()
            }
        );
    }
}
