//! SHA-256 digests and signing-context domains.
//!
//! Everything signed in this protocol is a digest of a canonical encoding,
//! prefixed with a context string. A signature produced for one context can
//! never verify in another.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Signing contexts used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Capability issuance payloads.
    Capability,
    /// Per-call invocation envelopes.
    Invocation,
}

impl Domain {
    /// The context prefix prepended before hashing.
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Capability => "OctraCapability:v2:",
            Self::Invocation => "OctraInvocation:v2:",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// A SHA-256 digest (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Hash arbitrary data.
    #[must_use]
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hash multiple data chunks (concatenated).
    #[must_use]
    pub fn hash_multi(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Hash data under a signing context: `SHA-256(prefix || data)`.
    #[must_use]
    pub fn hash_in_domain(domain: Domain, data: &[u8]) -> Self {
        Self::hash_multi(&[domain.prefix().as_bytes(), data])
    }

    /// The zero digest.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Whether this is the zero digest.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Try to create from a slice; `None` unless exactly 32 bytes.
    #[must_use]
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Encode as hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        Self::try_from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::zero()
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        assert_eq!(Digest::hash(data), Digest::hash(data));
        assert_ne!(Digest::hash(data), Digest::hash(b"different"));
    }

    #[test]
    fn test_hash_known_vector() {
        // SHA-256("abc")
        let digest = Digest::hash(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_multi_equals_concat() {
        let parts: &[&[u8]] = &[b"hello", b" ", b"world"];
        assert_eq!(Digest::hash_multi(parts), Digest::hash(b"hello world"));
    }

    #[test]
    fn test_domain_separation() {
        let data = b"same data";
        let cap = Digest::hash_in_domain(Domain::Capability, data);
        let inv = Digest::hash_in_domain(Domain::Invocation, data);
        assert_ne!(cap, inv);
        // And neither equals the bare hash.
        assert_ne!(cap, Digest::hash(data));
    }

    #[test]
    fn test_domain_prefix_is_plain_concatenation() {
        let data = b"payload";
        let expected = Digest::hash(b"OctraCapability:v2:payload");
        assert_eq!(Digest::hash_in_domain(Domain::Capability, data), expected);
    }

    #[test]
    fn test_hex_roundtrip() {
        let digest = Digest::hash(b"test");
        let back = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, back);
        assert!(Digest::from_hex("zz").is_err());
        assert!(Digest::from_hex("00").is_err());
    }

    #[test]
    fn test_zero() {
        assert!(Digest::zero().is_zero());
        assert!(!Digest::hash(b"x").is_zero());
    }

    #[test]
    fn test_serde() {
        let digest = Digest::hash(b"test");
        let json = serde_json::to_string(&digest).unwrap();
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(digest, back);
    }
}
