//! Octra Provider - the object a page talks to.
//!
//! This crate is the page-facing half of the protocol:
//! - [`WalletProvider`]: `connect` / `disconnect` / `request_capability` /
//!   `invoke` / `on` / `off`, all returning futures, with synchronous shape
//!   validation before anything touches the transport
//! - [`InvocationOrchestrator`]: builds signed invocation envelopes under a
//!   signing mutex, advancing the nonce optimistically and rolling it back
//!   when dispatch fails
//! - [`EventEmitter`]: `connect`, `disconnect`, `capabilityGranted`,
//!   `capabilityRevoked`, `branchChanged`, `epochChanged` events
//!
//! # Concurrency
//!
//! All invocation signing for one provider is serialized through a single
//! async mutex: each `invoke` fully completes (success or failure) before
//! the next acquires a nonce. The lock is released by guard drop on every
//! path, so an error can never deadlock subsequent calls.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod events;
mod orchestrator;
mod provider;

pub use events::{EventEmitter, EventKind, ListenerId, WalletEvent};
pub use orchestrator::InvocationOrchestrator;
pub use provider::{WalletProvider, wrap_provider_error};
