//! Octra Core - shared data model for the capability authorization protocol.
//!
//! This crate provides the types every other `octra-*` crate agrees on:
//! - Typed identifiers (capabilities, requests, sessions, circles)
//! - Millisecond-precision timestamps in their wire form
//! - Normalized origins and permission scopes
//! - The tagged invocation payload variant (bytes vs. opaque ciphertext)
//! - The cross-context message envelopes
//! - The protocol error taxonomy carried inside response envelopes
//!
//! # Design Philosophy
//!
//! **Decode once at the boundary.** Wire data is parsed into these types
//! exactly once; downstream code never re-sniffs shapes or pattern-matches
//! raw transport strings.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod connection;
mod error;
mod ids;
mod origin;
mod payload;
mod scope;
mod time;
mod transport;
mod wire;

pub use connection::Connection;
pub use error::{ProtocolError, ProtocolResult};
pub use ids::{CapabilityId, CircleId, RequestId, SessionId};
pub use origin::Origin;
pub use payload::InvocationPayload;
pub use scope::{Network, Scope};
pub use time::Timestamp;
pub use transport::Transport;
pub use wire::{
    CapabilityParams, ConnectParams, DisconnectParams, InvokeParams, MessageKind, RequestEnvelope,
    ResponseEnvelope, SOURCE_PAGE, SOURCE_RELAY,
};
