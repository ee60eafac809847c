//! The capability type and its canonical signing payload.
//!
//! A capability is immutable once signed. Its signature covers a canonical
//! rendering of every field except the signature itself, hashed under the
//! `OctraCapability:v2:` context; mutating any field (or reordering the
//! method list) changes the digest and invalidates the signature.

use serde::{Deserialize, Serialize};

use octra_canonical::{Value, canonicalize};
use octra_core::{CapabilityId, CircleId, Origin, ProtocolError, ProtocolResult, Scope, Timestamp};
use octra_crypto::{Digest, Domain, PublicKey, Signature, Vault};

use crate::error::{CapabilityError, CapabilityResult};

/// Current capability/invocation format version.
pub const PROTOCOL_VERSION: u16 = 2;

/// Lifecycle state of a capability.
///
/// `Expired` and `Revoked` are terminal; the only way back to `Active` is
/// re-issuance under a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityState {
    /// Valid and usable.
    Active,
    /// Expiry time has passed (detected lazily, no background timer).
    Expired,
    /// Explicitly revoked.
    Revoked,
}

/// What an application asks for when requesting a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    /// The circle the capability is scoped to.
    pub circle: CircleId,
    /// Requested method names (sorted at issuance).
    pub methods: Vec<String>,
    /// Requested permission tier.
    pub scope: Scope,
    /// Whether payloads must stay opaque.
    pub encrypted: bool,
    /// Requested lifetime in milliseconds.
    pub ttl_ms: i64,
}

impl CapabilitySpec {
    /// Validate request shape before any dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Validation`] for an empty method list, a
    /// blank method name, or a non-positive ttl. (An empty circle id is
    /// unrepresentable; see [`CircleId::new`].)
    pub fn validate(&self) -> ProtocolResult<()> {
        if self.methods.is_empty() {
            return Err(ProtocolError::validation("method list must not be empty"));
        }
        if self.methods.iter().any(|m| m.trim().is_empty()) {
            return Err(ProtocolError::validation("method names must not be empty"));
        }
        if self.ttl_ms <= 0 {
            return Err(ProtocolError::validation("ttl must be positive"));
        }
        Ok(())
    }
}

/// A signed, scoped, time-limited, origin-bound grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Unique capability identifier.
    pub id: CapabilityId,
    /// Format version (currently 2).
    pub version: u16,
    /// The circle the capability is scoped to.
    pub circle: CircleId,
    /// Granted method names, ascending.
    pub methods: Vec<String>,
    /// Granted permission tier.
    pub scope: Scope,
    /// Whether payloads must stay opaque.
    pub encrypted: bool,
    /// The exact origin this capability is bound to.
    pub app_origin: Origin,
    /// When the capability was issued.
    pub issued_at: Timestamp,
    /// When the capability expires.
    pub expires_at: Timestamp,
    /// Issuance anti-replay token, doubling as the invocation nonce base.
    pub nonce: u64,
    /// Public key of the issuing wallet.
    pub issuer_pubkey: PublicKey,
    /// Ed25519 signature over the domain-separated payload digest.
    pub signature: Signature,
}

impl Capability {
    /// Issue a new capability: sort the methods, stamp the lifetime, and
    /// sign the canonical payload through the vault.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidTimestamp`] if the ttl pushes the
    /// expiry outside the representable range.
    pub fn issue(
        spec: CapabilitySpec,
        app_origin: Origin,
        nonce: u64,
        vault: &dyn Vault,
    ) -> CapabilityResult<Self> {
        let issued_at = Timestamp::now();
        let expires_at = issued_at.saturating_add_ms(spec.ttl_ms);
        if expires_at <= issued_at {
            return Err(CapabilityError::InvalidTimestamp(format!(
                "ttl {}ms does not extend the lifetime",
                spec.ttl_ms
            )));
        }

        let mut methods = spec.methods;
        methods.sort_unstable();
        methods.dedup();

        let mut capability = Self {
            id: CapabilityId::new(),
            version: PROTOCOL_VERSION,
            circle: spec.circle,
            methods,
            scope: spec.scope,
            encrypted: spec.encrypted,
            app_origin,
            issued_at,
            expires_at,
            nonce,
            issuer_pubkey: vault.public_key(),
            signature: Signature::from_bytes([0u8; 64]), // Placeholder
        };

        capability.signature = vault.sign(capability.signing_digest().as_bytes());
        Ok(capability)
    }

    /// The canonical payload string the signature covers.
    ///
    /// Field order is the fixed key list `appOrigin, circle, encrypted,
    /// expiresAt, id, issuedAt, issuerPubKey, methods, nonce, scope,
    /// version`; `methods` is re-sorted here so the rendering is canonical
    /// even if the struct was built by hand.
    #[must_use]
    pub fn canonical_payload(&self) -> String {
        let mut methods = self.methods.clone();
        methods.sort_unstable();

        let value = Value::map([
            ("appOrigin", Value::from(self.app_origin.as_str())),
            ("circle", Value::from(self.circle.as_str())),
            ("encrypted", Value::from(self.encrypted)),
            ("expiresAt", Value::from(self.expires_at.unix_ms())),
            ("id", Value::from(self.id.0.to_string())),
            ("issuedAt", Value::from(self.issued_at.unix_ms())),
            ("issuerPubKey", Value::from(self.issuer_pubkey.to_hex())),
            (
                "methods",
                Value::Array(methods.into_iter().map(Value::from).collect()),
            ),
            ("nonce", Value::from(self.nonce)),
            ("scope", Value::from(self.scope.to_string())),
            ("version", Value::from(u64::from(self.version))),
        ]);
        canonicalize(&value)
    }

    /// The domain-separated digest the signature is made over.
    #[must_use]
    pub fn signing_digest(&self) -> Digest {
        Digest::hash_in_domain(Domain::Capability, self.canonical_payload().as_bytes())
    }

    /// Verify the capability's signature against its issuer key.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::SignatureInvalid`] if it does not verify.
    pub fn verify_signature(&self) -> CapabilityResult<()> {
        self.issuer_pubkey
            .verify(self.signing_digest().as_bytes(), &self.signature)
            .map_err(|_| CapabilityError::SignatureInvalid)
    }

    /// Whether the expiry time has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        !self.expires_at.is_future()
    }

    /// Check signature, expiry, and origin binding in one pass.
    ///
    /// # Errors
    ///
    /// Returns the specific violation: [`CapabilityError::Expired`],
    /// [`CapabilityError::OriginMismatch`], or
    /// [`CapabilityError::SignatureInvalid`].
    pub fn validate_for(&self, presenter: &Origin) -> CapabilityResult<()> {
        if self.is_expired() {
            return Err(CapabilityError::Expired {
                id: self.id.to_string(),
            });
        }
        if self.app_origin != *presenter {
            return Err(CapabilityError::OriginMismatch {
                bound: self.app_origin.as_str().to_string(),
                presenter: presenter.as_str().to_string(),
            });
        }
        self.verify_signature()
    }

    /// Whether a method is in the granted set.
    #[must_use]
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octra_crypto::{KeyPair, SoftwareVault};

    fn test_vault() -> SoftwareVault {
        SoftwareVault::generate()
    }

    fn demo_spec() -> CapabilitySpec {
        CapabilitySpec {
            circle: CircleId::new("demo").unwrap(),
            methods: vec!["submit_input".into(), "read_stats".into()],
            scope: Scope::Compute,
            encrypted: false,
            ttl_ms: 60_000,
        }
    }

    fn origin() -> Origin {
        Origin::parse("https://app.example").unwrap()
    }

    #[test]
    fn test_issue_sorts_methods_and_signs() {
        let vault = test_vault();
        let cap = Capability::issue(demo_spec(), origin(), 5, &vault).unwrap();

        assert_eq!(cap.methods, vec!["read_stats", "submit_input"]);
        assert_eq!(cap.version, PROTOCOL_VERSION);
        assert!(!cap.is_expired());
        assert!(cap.verify_signature().is_ok());
    }

    #[test]
    fn test_canonical_payload_is_method_order_independent() {
        let vault = test_vault();
        let mut cap = Capability::issue(demo_spec(), origin(), 5, &vault).unwrap();
        let canonical = cap.canonical_payload();

        // Hand-reorder the stored methods: the canonical rendering re-sorts.
        cap.methods.reverse();
        assert_eq!(cap.canonical_payload(), canonical);
        assert!(cap.verify_signature().is_ok());
    }

    #[test]
    fn test_canonical_payload_fixed_vector() {
        let keypair = KeyPair::from_secret_key(&[7u8; 32]).unwrap();
        let vault = SoftwareVault::new(keypair);
        let pk_hex = vault.public_key().to_hex();

        let cap = Capability {
            id: CapabilityId(uuid::Uuid::nil()),
            version: 2,
            circle: CircleId::new("demo").unwrap(),
            methods: vec!["read_stats".into(), "submit_input".into()],
            scope: Scope::Compute,
            encrypted: false,
            app_origin: origin(),
            issued_at: Timestamp::from_unix_ms(1_700_000_000_000).unwrap(),
            expires_at: Timestamp::from_unix_ms(1_700_000_060_000).unwrap(),
            nonce: 5,
            issuer_pubkey: vault.public_key(),
            signature: Signature::from_bytes([0u8; 64]),
        };

        let expected = format!(
            "{{\"appOrigin\":\"https://app.example\",\"circle\":\"demo\",\
             \"encrypted\":false,\"expiresAt\":1700000060000,\
             \"id\":\"00000000-0000-0000-0000-000000000000\",\
             \"issuedAt\":1700000000000,\"issuerPubKey\":\"{pk_hex}\",\
             \"methods\":[\"read_stats\",\"submit_input\"],\"nonce\":5,\
             \"scope\":\"compute\",\"version\":2}}"
        );
        assert_eq!(cap.canonical_payload(), expected);

        // And signing that exact vector verifies.
        let mut signed = cap;
        signed.signature = vault.sign(signed.signing_digest().as_bytes());
        assert!(signed.verify_signature().is_ok());
    }

    #[test]
    fn test_tamper_invalidates_signature() {
        let vault = test_vault();
        let cap = Capability::issue(demo_spec(), origin(), 5, &vault).unwrap();
        let baseline = cap.signing_digest();

        let mut tampered = cap.clone();
        tampered.scope = Scope::Write;
        assert_ne!(tampered.signing_digest(), baseline);
        assert!(matches!(
            tampered.verify_signature(),
            Err(CapabilityError::SignatureInvalid)
        ));

        let mut extra_method = cap.clone();
        extra_method.methods.push("transfer".into());
        assert!(extra_method.verify_signature().is_err());

        let mut moved = cap;
        moved.app_origin = Origin::parse("https://evil.example").unwrap();
        assert!(moved.verify_signature().is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let vault = test_vault();
        let mut cap = Capability::issue(demo_spec(), origin(), 0, &vault).unwrap();

        cap.expires_at = Timestamp::now().saturating_add_ms(-1);
        assert!(cap.is_expired());

        cap.expires_at = Timestamp::now().saturating_add_ms(50);
        assert!(!cap.is_expired());
    }

    #[test]
    fn test_validate_for_specific_errors() {
        let vault = test_vault();
        let cap = Capability::issue(demo_spec(), origin(), 0, &vault).unwrap();

        assert!(cap.validate_for(&origin()).is_ok());

        let stranger = Origin::parse("https://other.example").unwrap();
        assert!(matches!(
            cap.validate_for(&stranger),
            Err(CapabilityError::OriginMismatch { .. })
        ));

        let mut expired = cap;
        expired.expires_at = Timestamp::now().saturating_add_ms(-10);
        assert!(matches!(
            expired.validate_for(&origin()),
            Err(CapabilityError::Expired { .. })
        ));
    }

    #[test]
    fn test_spec_validation() {
        let mut spec = demo_spec();
        assert!(spec.validate().is_ok());

        spec.methods.clear();
        assert!(spec.validate().is_err());

        let mut blank = demo_spec();
        blank.methods = vec!["  ".into()];
        assert!(blank.validate().is_err());

        let mut no_ttl = demo_spec();
        no_ttl.ttl_ms = 0;
        assert!(no_ttl.validate().is_err());
    }

    #[test]
    fn test_allows_method() {
        let vault = test_vault();
        let cap = Capability::issue(demo_spec(), origin(), 0, &vault).unwrap();
        assert!(cap.allows_method("read_stats"));
        assert!(!cap.allows_method("unlisted_method"));
    }

    #[test]
    fn test_serde_roundtrip_preserves_signature() {
        let vault = test_vault();
        let cap = Capability::issue(demo_spec(), origin(), 9, &vault).unwrap();
        let json = serde_json::to_string(&cap).unwrap();
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, cap.id);
        assert!(back.verify_signature().is_ok());
    }
}
