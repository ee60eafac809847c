//! The chain-execution boundary.
//!
//! Transaction construction and broadcast are not this subsystem's concern;
//! the broker hands fully authorized invocations across this trait and
//! returns whatever comes back.

use async_trait::async_trait;
use serde_json::Value;

use octra_capabilities::{Capability, SignedInvocation};
use octra_core::{InvocationPayload, ProtocolResult};

/// Executes an invocation that has already passed every authorization check.
#[async_trait]
pub trait InvocationExecutor: Send + Sync {
    /// Execute the call and return its result.
    async fn execute(
        &self,
        capability: &Capability,
        invocation: &SignedInvocation,
        payload: Option<InvocationPayload>,
    ) -> ProtocolResult<Value>;
}

/// Test executor echoing the call coordinates back.
#[derive(Debug, Default)]
pub struct EchoExecutor;

#[async_trait]
impl InvocationExecutor for EchoExecutor {
    async fn execute(
        &self,
        capability: &Capability,
        invocation: &SignedInvocation,
        payload: Option<InvocationPayload>,
    ) -> ProtocolResult<Value> {
        Ok(serde_json::json!({
            "circle": capability.circle.as_str(),
            "method": invocation.body.method,
            "nonce": invocation.header.nonce,
            "payload_hash": invocation.body.payload_hash.to_hex(),
            "had_payload": payload.is_some(),
        }))
    }
}
