//! Octra Capabilities - signed, scoped, time-limited grants.
//!
//! A capability is a cryptographically signed authorization for a specific
//! origin to call specific methods in a circle at a given scope. This crate
//! provides:
//! - The [`Capability`] type and its canonical signing payload
//! - The [`CapabilityStore`] with per-origin capacity and lazy expiry
//! - The [`NonceManager`] guarding against replayed or out-of-order calls
//! - The [`SignedInvocation`] envelope built for every authorized call
//!
//! # Security Philosophy
//!
//! **Cryptography over bookkeeping.** A capability's authority comes from
//! its ed25519 signature over a canonical payload, not from its presence in
//! any table; the store's checks are on top of, never instead of, signature
//! verification.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod capability;
mod error;
mod invocation;
mod nonce;
mod store;

pub use capability::{Capability, CapabilitySpec, CapabilityState, PROTOCOL_VERSION};
pub use error::{CapabilityError, CapabilityResult};
pub use invocation::{InvocationBody, InvocationHeader, SignedInvocation};
pub use nonce::NonceManager;
pub use store::{CapabilityStore, StoreConfig};
