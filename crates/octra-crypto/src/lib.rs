//! Octra Crypto - hashing, signatures, and domain separation.
//!
//! This crate provides:
//! - SHA-256 digests with domain-separated signing contexts
//! - Ed25519 key pairs with secure memory handling
//! - A fail-closed boolean verification facade for untrusted input
//! - The vault boundary behind which private key material lives
//!
//! # Security Philosophy
//!
//! **Fail closed.** Verification over untrusted bytes returns `false` for
//! malformed lengths or bad keys; it never panics and never errors up into
//! a path that could be misread as success.
//!
//! # Example
//!
//! ```
//! use octra_crypto::{Digest, Domain, KeyPair};
//!
//! let keypair = KeyPair::generate();
//! let digest = Digest::hash_in_domain(Domain::Capability, b"payload");
//! let signature = keypair.sign(digest.as_bytes());
//! assert!(keypair.verify(digest.as_bytes(), &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod digest;
mod error;
mod keypair;
mod signature;
mod vault;

pub use digest::{Digest, Domain};
pub use error::{CryptoError, CryptoResult};
pub use keypair::{KeyPair, PublicKey};
pub use signature::{Signature, verify_detached};
pub use vault::{SoftwareVault, Vault};
