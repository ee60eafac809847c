//! Octra Broker - the long-lived authorization process.
//!
//! The broker sits between the trusted relay and the wallet's vault. It:
//! - independently re-derives the true sender origin and rejects requests
//!   whose claimed origin disagrees (fail-closed)
//! - correlates requests and responses through a one-shot registry with a
//!   hard per-class timeout, so no request hangs forever and no stale
//!   listener leaks
//! - surfaces approval prompts to a human and issues signed capabilities
//!   through the vault on approval
//! - validates invocation envelopes (state, origin binding, scope, nonce)
//!   and either auto-executes read-only methods or asks the human first
//!
//! # Concurrency
//!
//! The broker runs as a single-threaded reactor; tables are owned here and
//! other contexts reach them exclusively by message passing. Pending
//! approvals resolve exactly once: a late verdict after timeout is dropped,
//! never double-resolved.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod approval;
mod broker;
mod connections;
mod executor;
mod pending;
mod policy;
mod relay;
mod storage;

pub use approval::{
    ApprovalPrompt, ApprovalSurface, ApprovalVerdict, AutoApproveSurface, AutoDenySurface,
    SilentSurface, VerdictSink,
};
pub use broker::{Broker, BrokerConfig};
pub use connections::ConnectionRegistry;
pub use executor::{EchoExecutor, InvocationExecutor};
pub use pending::{PendingRequests, RequestClass};
pub use policy::AutoExecPolicy;
pub use relay::Relay;
pub use storage::{KvStore, MemoryKvStore};
