//! The human-approval surface boundary.
//!
//! The broker renders a prompt describing what is being asked and by whom;
//! the surface eventually submits exactly one terminal verdict for it.
//! Different frontends (extension popup, terminal, test doubles) implement
//! [`ApprovalSurface`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use octra_core::{CircleId, Network, Origin, RequestId, Scope};

use crate::pending::{PendingRequests, RequestClass};

/// What the approval surface renders for a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "prompt", rename_all = "snake_case")]
pub enum ApprovalPrompt {
    /// A page wants to connect.
    Connection {
        /// Correlation id.
        request_id: RequestId,
        /// The requesting origin.
        origin: Origin,
        /// Human-readable application name.
        app_name: String,
        /// Optional icon URL.
        app_icon: Option<String>,
        /// Network the connection will operate on.
        network: Network,
    },
    /// A page wants a capability grant.
    CapabilityGrant {
        /// Correlation id.
        request_id: RequestId,
        /// The requesting origin.
        origin: Origin,
        /// Human-readable application name.
        app_name: String,
        /// Optional icon URL.
        app_icon: Option<String>,
        /// The circle the grant is scoped to.
        circle: CircleId,
        /// Requested methods, sorted.
        methods: Vec<String>,
        /// Requested permission tier.
        scope: Scope,
        /// Whether payloads stay opaque.
        encrypted: bool,
        /// Requested lifetime in milliseconds.
        ttl_ms: i64,
    },
    /// An invocation needs explicit approval.
    Invocation {
        /// Correlation id.
        request_id: RequestId,
        /// The invoking origin.
        origin: Origin,
        /// The circle the call targets.
        circle: CircleId,
        /// The method being invoked.
        method: String,
        /// Whether the payload is opaque ciphertext.
        encrypted: bool,
    },
}

impl ApprovalPrompt {
    /// The correlation id of the request this prompt belongs to.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Connection { request_id, .. }
            | Self::CapabilityGrant { request_id, .. }
            | Self::Invocation { request_id, .. } => *request_id,
        }
    }

    /// The request class this prompt resolves.
    #[must_use]
    pub fn class(&self) -> RequestClass {
        match self {
            Self::Connection { .. } => RequestClass::Connection,
            Self::CapabilityGrant { .. } => RequestClass::CapabilityGrant,
            Self::Invocation { .. } => RequestClass::Invocation,
        }
    }
}

/// The surface's single terminal message for a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalVerdict {
    /// The request this verdict resolves.
    pub request_id: RequestId,
    /// The class of the resolved request.
    pub class: RequestClass,
    /// The origin the decision applies to.
    pub app_origin: Origin,
    /// The decision.
    pub approved: bool,
    /// Approval-specific extra fields (surface-defined).
    #[serde(default)]
    pub fields: Value,
}

impl ApprovalVerdict {
    /// An approval for a prompt.
    #[must_use]
    pub fn approve(prompt: &ApprovalPrompt, origin: Origin) -> Self {
        Self {
            request_id: prompt.request_id(),
            class: prompt.class(),
            app_origin: origin,
            approved: true,
            fields: Value::Null,
        }
    }

    /// A denial for a prompt.
    #[must_use]
    pub fn deny(prompt: &ApprovalPrompt, origin: Origin) -> Self {
        Self {
            request_id: prompt.request_id(),
            class: prompt.class(),
            app_origin: origin,
            approved: false,
            fields: Value::Null,
        }
    }
}

/// Handle through which a surface submits its verdict.
///
/// Cloneable and detached from the broker so surfaces can answer from any
/// task. Submitting twice, or after the timeout, is a no-op.
#[derive(Clone)]
pub struct VerdictSink {
    pending: Arc<PendingRequests>,
}

impl VerdictSink {
    pub(crate) fn new(pending: Arc<PendingRequests>) -> Self {
        Self { pending }
    }

    /// Deliver a verdict. Returns `false` if the request is no longer
    /// outstanding (already resolved or timed out).
    pub fn submit(&self, verdict: ApprovalVerdict) -> bool {
        self.pending.resolve(verdict.request_id, verdict)
    }
}

impl std::fmt::Debug for VerdictSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdictSink")
            .field("outstanding", &self.pending.len())
            .finish()
    }
}

/// A frontend able to render approval prompts to a human.
#[async_trait]
pub trait ApprovalSurface: Send + Sync {
    /// Render a prompt. Fire-and-forget: the decision comes back later
    /// through the sink, or not at all (the broker's timeout covers that).
    async fn present(&self, prompt: ApprovalPrompt, sink: VerdictSink);
}

/// Test surface that approves everything immediately.
#[derive(Debug, Default)]
pub struct AutoApproveSurface;

#[async_trait]
impl ApprovalSurface for AutoApproveSurface {
    async fn present(&self, prompt: ApprovalPrompt, sink: VerdictSink) {
        let origin = match &prompt {
            ApprovalPrompt::Connection { origin, .. }
            | ApprovalPrompt::CapabilityGrant { origin, .. }
            | ApprovalPrompt::Invocation { origin, .. } => origin.clone(),
        };
        sink.submit(ApprovalVerdict::approve(&prompt, origin));
    }
}

/// Test surface that denies everything immediately.
#[derive(Debug, Default)]
pub struct AutoDenySurface;

#[async_trait]
impl ApprovalSurface for AutoDenySurface {
    async fn present(&self, prompt: ApprovalPrompt, sink: VerdictSink) {
        let origin = match &prompt {
            ApprovalPrompt::Connection { origin, .. }
            | ApprovalPrompt::CapabilityGrant { origin, .. }
            | ApprovalPrompt::Invocation { origin, .. } => origin.clone(),
        };
        sink.submit(ApprovalVerdict::deny(&prompt, origin));
    }
}

/// Test surface that never answers (exercises the timeout path).
#[derive(Debug, Default)]
pub struct SilentSurface;

#[async_trait]
impl ApprovalSurface for SilentSurface {
    async fn present(&self, _prompt: ApprovalPrompt, _sink: VerdictSink) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_accessors() {
        let prompt = ApprovalPrompt::Invocation {
            request_id: RequestId::new(),
            origin: Origin::parse("https://app.example").unwrap(),
            circle: CircleId::new("demo").unwrap(),
            method: "read_stats".into(),
            encrypted: false,
        };
        assert_eq!(prompt.class(), RequestClass::Invocation);
        assert_eq!(prompt.request_id(), prompt.request_id());
    }

    #[test]
    fn test_verdict_shape() {
        let origin = Origin::parse("https://app.example").unwrap();
        let prompt = ApprovalPrompt::Connection {
            request_id: RequestId::new(),
            origin: origin.clone(),
            app_name: "Demo".into(),
            app_icon: None,
            network: Network::default(),
        };
        let verdict = ApprovalVerdict::approve(&prompt, origin.clone());
        assert!(verdict.approved);
        assert_eq!(verdict.app_origin, origin);
        assert_eq!(verdict.class, RequestClass::Connection);

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["approved"], serde_json::json!(true));
        assert!(json.get("app_origin").is_some());
    }
}
