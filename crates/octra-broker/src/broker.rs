//! The broker itself.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use octra_capabilities::{
    Capability, CapabilitySpec, CapabilityStore, NonceManager, SignedInvocation, StoreConfig,
};
use octra_core::{
    CapabilityParams, ConnectParams, Connection, DisconnectParams, InvocationPayload,
    InvokeParams, MessageKind, Network, Origin, ProtocolError, ProtocolResult, RequestEnvelope,
    RequestId, ResponseEnvelope, SessionId, Timestamp,
};
use octra_crypto::{Digest, Vault};

use crate::approval::{ApprovalPrompt, ApprovalSurface, ApprovalVerdict, VerdictSink};
use crate::connections::ConnectionRegistry;
use crate::executor::InvocationExecutor;
use crate::pending::{PendingRequests, RequestClass};
use crate::policy::AutoExecPolicy;
use crate::storage::KvStore;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Default network for new connections.
    pub network: Network,
    /// Timeout for connection approvals.
    pub connection_timeout: Duration,
    /// Timeout for capability-grant approvals.
    pub capability_timeout: Duration,
    /// Timeout for invocation approvals.
    pub invocation_timeout: Duration,
    /// Capability store configuration.
    pub store: StoreConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            connection_timeout: RequestClass::Connection.default_timeout(),
            capability_timeout: RequestClass::CapabilityGrant.default_timeout(),
            invocation_timeout: RequestClass::Invocation.default_timeout(),
            store: StoreConfig::default(),
        }
    }
}

/// The durable record of an in-flight approval, one per request class.
///
/// Stashed so a request survives approval-surface navigation; removed once
/// the request resolves or times out.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingRecord {
    request_id: RequestId,
    class: RequestClass,
    origin: Origin,
    created_at: Timestamp,
}

/// The long-lived authorization process.
pub struct Broker {
    vault: Arc<dyn Vault>,
    surface: Arc<dyn ApprovalSurface>,
    executor: Arc<dyn InvocationExecutor>,
    storage: Arc<dyn KvStore>,
    store: CapabilityStore,
    nonces: NonceManager,
    connections: ConnectionRegistry,
    pending: Arc<PendingRequests>,
    policy: AutoExecPolicy,
    config: BrokerConfig,
}

impl Broker {
    /// Create a broker.
    #[must_use]
    pub fn new(
        vault: Arc<dyn Vault>,
        surface: Arc<dyn ApprovalSurface>,
        executor: Arc<dyn InvocationExecutor>,
        storage: Arc<dyn KvStore>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            vault,
            surface,
            executor,
            storage,
            store: CapabilityStore::with_config(config.store.clone()),
            nonces: NonceManager::new(),
            connections: ConnectionRegistry::new(),
            pending: Arc::new(PendingRequests::new()),
            policy: AutoExecPolicy::standard(),
            config,
        }
    }

    /// Replace the auto-execute policy.
    #[must_use]
    pub fn with_policy(mut self, policy: AutoExecPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// A sink through which approval surfaces submit verdicts.
    #[must_use]
    pub fn verdict_sink(&self) -> VerdictSink {
        VerdictSink::new(Arc::clone(&self.pending))
    }

    /// Deliver a verdict from an out-of-band surface.
    ///
    /// Returns `false` if the request is no longer outstanding.
    pub fn submit_verdict(&self, verdict: ApprovalVerdict) -> bool {
        self.pending.resolve(verdict.request_id, verdict)
    }

    /// The capability store (read access for dashboards and tests).
    #[must_use]
    pub fn capability_store(&self) -> &CapabilityStore {
        &self.store
    }

    /// The connection registry.
    #[must_use]
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Handle one request envelope.
    ///
    /// `sender_origin` is the true origin, independently derived by the
    /// trusted relay; it is never taken from the envelope. The response
    /// always correlates by the envelope's request id.
    pub async fn handle_request(
        &self,
        envelope: RequestEnvelope,
        sender_origin: &Origin,
    ) -> ResponseEnvelope {
        let request_id = envelope.request_id;
        let kind = envelope.kind.result_kind();
        match self.dispatch(envelope, sender_origin).await {
            Ok(result) => ResponseEnvelope::ok(request_id, kind, &result)
                .unwrap_or_else(|e| ResponseEnvelope::err(request_id, kind, e)),
            Err(error) => {
                if error.is_security_fault() {
                    tracing::warn!(request = %request_id, origin = %sender_origin, %error, "rejected request");
                } else {
                    tracing::debug!(request = %request_id, origin = %sender_origin, %error, "request failed");
                }
                ResponseEnvelope::err(request_id, kind, error)
            }
        }
    }

    async fn dispatch(
        &self,
        envelope: RequestEnvelope,
        sender: &Origin,
    ) -> ProtocolResult<Value> {
        match envelope.kind {
            MessageKind::ConnectionRequest => self.handle_connect(&envelope, sender).await,
            MessageKind::CapabilityRequest => self.handle_capability(&envelope, sender).await,
            MessageKind::InvokeRequest => self.handle_invoke(&envelope, sender).await,
            MessageKind::DisconnectRequest => self.handle_disconnect(&envelope, sender).await,
            other => Err(ProtocolError::validation(format!(
                "unexpected message kind: {other:?}"
            ))),
        }
    }

    /// Fail closed if the claimed origin disagrees with the derived one.
    ///
    /// This is what stops a compromised relay (or page) from laundering
    /// requests for another origin.
    fn check_claimed_origin(claimed: &Origin, sender: &Origin) -> ProtocolResult<()> {
        if claimed == sender {
            Ok(())
        } else {
            Err(sender.mismatch(claimed))
        }
    }

    async fn handle_connect(
        &self,
        envelope: &RequestEnvelope,
        sender: &Origin,
    ) -> ProtocolResult<Value> {
        let params: ConnectParams = envelope.params()?;
        Self::check_claimed_origin(&params.app_origin, sender)?;

        // One connection per origin: reconnecting returns the existing link.
        if let Some(existing) = self.connections.get(sender) {
            return serde_json::to_value(existing)
                .map_err(|e| ProtocolError::validation(e.to_string()));
        }

        let network = params.network.clone().unwrap_or_else(|| self.config.network.clone());
        let prompt = ApprovalPrompt::Connection {
            request_id: envelope.request_id,
            origin: sender.clone(),
            app_name: params.app_name.clone(),
            app_icon: params.app_icon.clone(),
            network: network.clone(),
        };
        let verdict = self.request_approval(prompt, sender).await?;
        if !verdict.approved {
            return Err(ProtocolError::UserRejected);
        }

        let connection = Connection {
            circle: params.circle,
            session_id: SessionId::new(),
            wallet_pubkey: self.vault.public_key().to_hex(),
            secondary_address: None,
            network,
            origin: sender.clone(),
            connected_at: Timestamp::now(),
        };
        self.connections
            .upsert(connection.clone(), &*self.storage)
            .await?;
        tracing::info!(origin = %sender, session = %connection.session_id, "connection approved");

        serde_json::to_value(connection).map_err(|e| ProtocolError::validation(e.to_string()))
    }

    async fn handle_capability(
        &self,
        envelope: &RequestEnvelope,
        sender: &Origin,
    ) -> ProtocolResult<Value> {
        let params: CapabilityParams = envelope.params()?;
        Self::check_claimed_origin(&params.app_origin, sender)?;

        let spec = CapabilitySpec {
            circle: params.circle.clone(),
            methods: params.methods.clone(),
            scope: params.scope,
            encrypted: params.encrypted,
            ttl_ms: params.ttl_ms,
        };
        spec.validate()?;

        if self.connections.get(sender).is_none() {
            return Err(ProtocolError::NotConnected);
        }

        let mut display_methods = params.methods.clone();
        display_methods.sort_unstable();
        let prompt = ApprovalPrompt::CapabilityGrant {
            request_id: envelope.request_id,
            origin: sender.clone(),
            app_name: params.app_name.clone(),
            app_icon: params.app_icon.clone(),
            circle: params.circle,
            methods: display_methods,
            scope: params.scope,
            encrypted: params.encrypted,
            ttl_ms: params.ttl_ms,
        };
        let verdict = self.request_approval(prompt, sender).await?;
        if !verdict.approved {
            return Err(ProtocolError::UserRejected);
        }

        // Fresh nonce base per issuance; re-issuance starts a new sequence.
        let nonce_base = u64::from(rand::random::<u32>());
        let capability = Capability::issue(spec, sender.clone(), nonce_base, &*self.vault)
            .map_err(ProtocolError::from)?;

        // Trusted path: this capability was signed two lines up by our own
        // vault; re-verification would re-check our own work.
        self.store
            .add_trusted(capability.clone())
            .map_err(ProtocolError::from)?;
        self.nonces
            .reset(capability.id, capability.nonce)
            .map_err(ProtocolError::from)?;
        tracing::info!(origin = %sender, capability = %capability.id, "capability issued");

        serde_json::to_value(capability).map_err(|e| ProtocolError::validation(e.to_string()))
    }

    async fn handle_invoke(
        &self,
        envelope: &RequestEnvelope,
        sender: &Origin,
    ) -> ProtocolResult<Value> {
        let params: InvokeParams = envelope.params()?;
        Self::check_claimed_origin(&params.app_origin, sender)?;

        let invocation: SignedInvocation = serde_json::from_value(params.invocation.clone())
            .map_err(|e| ProtocolError::validation(format!("malformed invocation: {e}")))?;
        if invocation.body.capability_id != params.capability_id {
            return Err(ProtocolError::validation(
                "invocation envelope names a different capability",
            ));
        }
        if invocation.body.method != params.method {
            return Err(ProtocolError::validation(
                "invocation envelope names a different method",
            ));
        }

        // Decode the payload exactly once, then verify it is the payload
        // the envelope was built over.
        let payload = params
            .payload
            .as_ref()
            .map(InvocationPayload::from_wire)
            .transpose()?;
        let expected_hash = payload
            .as_ref()
            .map_or_else(Digest::zero, |p| Digest::hash(p.hash_input()));
        if expected_hash != invocation.body.payload_hash {
            return Err(ProtocolError::validation("payload hash mismatch"));
        }

        let capability = self
            .store
            .get(params.capability_id)
            .map_err(ProtocolError::from)?
            .ok_or(ProtocolError::Capability {
                reason: format!("not found: {}", params.capability_id),
            })?;

        // Specific precondition errors, never a generic failure.
        capability.validate_for(sender).map_err(ProtocolError::from)?;
        if !capability.allows_method(&params.method) {
            return Err(ProtocolError::ScopeViolation {
                method: params.method,
            });
        }
        if !invocation.verify_origin_binding(&capability.circle, sender) {
            return Err(ProtocolError::OriginMismatch {
                claimed: format!("origin-hash {}", invocation.header.origin_hash),
                actual: sender.as_str().to_string(),
            });
        }

        // Fast-fail replays before any approval side effects.
        self.nonces
            .check(capability.id, invocation.header.nonce)
            .map_err(ProtocolError::from)?;

        if !self.policy.permits(&params.method, capability.scope) {
            let prompt = ApprovalPrompt::Invocation {
                request_id: envelope.request_id,
                origin: sender.clone(),
                circle: capability.circle.clone(),
                method: params.method.clone(),
                encrypted: capability.encrypted,
            };
            let verdict = self.request_approval(prompt, sender).await?;
            if !verdict.approved {
                return Err(ProtocolError::UserRejected);
            }
        }

        // Record the nonce only once the call is actually going out; a
        // denial above leaves the watermark untouched so the caller can
        // retry with the same sequence number.
        self.nonces
            .validate(capability.id, invocation.header.nonce)
            .map_err(ProtocolError::from)?;

        self.executor.execute(&capability, &invocation, payload).await
    }

    async fn handle_disconnect(
        &self,
        envelope: &RequestEnvelope,
        sender: &Origin,
    ) -> ProtocolResult<Value> {
        let params: DisconnectParams = envelope.params()?;
        Self::check_claimed_origin(&params.app_origin, sender)?;

        let removed = self.connections.remove(sender, &*self.storage).await?;
        if removed.is_some() {
            tracing::info!(origin = %sender, "disconnected");
        }
        Ok(Value::Bool(removed.is_some()))
    }

    fn timeout_for(&self, class: RequestClass) -> Duration {
        match class {
            RequestClass::Connection => self.config.connection_timeout,
            RequestClass::CapabilityGrant => self.config.capability_timeout,
            RequestClass::Invocation => self.config.invocation_timeout,
        }
    }

    /// Present a prompt and await its one-shot verdict under the class
    /// timeout, stashing a durable pending record for the duration.
    async fn request_approval(
        &self,
        prompt: ApprovalPrompt,
        origin: &Origin,
    ) -> ProtocolResult<ApprovalVerdict> {
        let request_id = prompt.request_id();
        let class = prompt.class();

        let record = PendingRecord {
            request_id,
            class,
            origin: origin.clone(),
            created_at: Timestamp::now(),
        };
        let record_bytes = serde_json::to_vec(&record)
            .map_err(|e| ProtocolError::transport(e.to_string()))?;
        self.storage.set(class.storage_key(), record_bytes).await?;

        let rx = self.pending.register(request_id);
        self.surface.present(prompt, self.verdict_sink()).await;
        let result = self
            .pending
            .await_verdict(request_id, rx, self.timeout_for(class))
            .await;

        // The stash exists only while the request is in flight.
        if let Err(e) = self.storage.remove(class.storage_key()).await {
            tracing::warn!(%e, "failed to clear pending record");
        }
        result
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("store", &self.store)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
