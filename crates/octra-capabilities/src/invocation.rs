//! The per-call invocation envelope.
//!
//! Every authorized call travels as a [`SignedInvocation`]: a header binding
//! the call to its circle, origin, epoch, branch, and nonce through a
//! domain-separated hash, and a body naming the capability, method, and
//! payload digest. The payload itself is hashed, never interpreted.

use serde::{Deserialize, Serialize};

use octra_canonical::{Value, canonicalize};
use octra_core::{CapabilityId, CircleId, InvocationPayload, Origin, Timestamp};
use octra_crypto::{Digest, Domain};

use crate::capability::PROTOCOL_VERSION;

/// Invocation envelope header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationHeader {
    /// Format version (currently 2).
    pub version: u16,
    /// The circle the call targets.
    pub circle_id: CircleId,
    /// The active branch at call time.
    pub branch_id: String,
    /// The active epoch at call time.
    pub epoch: u64,
    /// Per-capability monotonic sequence number.
    pub nonce: u64,
    /// When the envelope was built.
    pub timestamp: Timestamp,
    /// Domain-separated hash binding circle, origin, epoch, branch,
    /// capability, method, and nonce. Not a payload hash.
    pub origin_hash: Digest,
}

/// Invocation envelope body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationBody {
    /// The capability the call runs under.
    pub capability_id: CapabilityId,
    /// The method being invoked.
    pub method: String,
    /// Digest of the payload bytes (or of the ciphertext when opaque).
    pub payload_hash: Digest,
}

/// A complete per-call envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedInvocation {
    /// Envelope header.
    pub header: InvocationHeader,
    /// Envelope body.
    pub body: InvocationBody,
}

impl SignedInvocation {
    /// Compute the origin-binding hash for a set of call coordinates.
    ///
    /// The coordinates are canonicalized as a sorted map and hashed under
    /// the `OctraInvocation:v2:` context, so this hash can never collide
    /// with a capability digest over the same bytes.
    #[must_use]
    pub fn origin_hash(
        circle: &CircleId,
        origin: &Origin,
        epoch: u64,
        branch_id: &str,
        capability_id: CapabilityId,
        method: &str,
        nonce: u64,
    ) -> Digest {
        let value = Value::map([
            ("branch", Value::from(branch_id)),
            ("capabilityId", Value::from(capability_id.0.to_string())),
            ("circle", Value::from(circle.as_str())),
            ("epoch", Value::from(epoch)),
            ("method", Value::from(method)),
            ("nonce", Value::from(nonce)),
            ("origin", Value::from(origin.as_str())),
        ]);
        Digest::hash_in_domain(Domain::Invocation, canonicalize(&value).as_bytes())
    }

    /// Build an envelope for a call.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        circle: &CircleId,
        origin: &Origin,
        epoch: u64,
        branch_id: &str,
        capability_id: CapabilityId,
        method: &str,
        nonce: u64,
        payload: Option<&InvocationPayload>,
    ) -> Self {
        let payload_hash = payload.map_or_else(Digest::zero, |p| Digest::hash(p.hash_input()));
        Self {
            header: InvocationHeader {
                version: PROTOCOL_VERSION,
                circle_id: circle.clone(),
                branch_id: branch_id.to_string(),
                epoch,
                nonce,
                timestamp: Timestamp::now(),
                origin_hash: Self::origin_hash(
                    circle,
                    origin,
                    epoch,
                    branch_id,
                    capability_id,
                    method,
                    nonce,
                ),
            },
            body: InvocationBody {
                capability_id,
                method: method.to_string(),
                payload_hash,
            },
        }
    }

    /// Recompute the origin hash from independently known coordinates and
    /// compare. A mismatch means the envelope was built for a different
    /// origin (or tampered with) and must be rejected.
    #[must_use]
    pub fn verify_origin_binding(&self, circle: &CircleId, origin: &Origin) -> bool {
        let expected = Self::origin_hash(
            circle,
            origin,
            self.header.epoch,
            &self.header.branch_id,
            self.body.capability_id,
            &self.body.method,
            self.header.nonce,
        );
        self.header.origin_hash == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinates() -> (CircleId, Origin, CapabilityId) {
        (
            CircleId::new("demo").unwrap(),
            Origin::parse("https://app.example").unwrap(),
            CapabilityId::new(),
        )
    }

    #[test]
    fn test_build_and_verify_origin_binding() {
        let (circle, origin, cap_id) = coordinates();
        let invocation = SignedInvocation::build(
            &circle,
            &origin,
            3,
            "main",
            cap_id,
            "read_stats",
            6,
            None,
        );

        assert_eq!(invocation.header.version, PROTOCOL_VERSION);
        assert!(invocation.verify_origin_binding(&circle, &origin));

        let other = Origin::parse("https://evil.example").unwrap();
        assert!(!invocation.verify_origin_binding(&circle, &other));
    }

    #[test]
    fn test_origin_hash_differs_per_coordinate() {
        let (circle, origin, cap_id) = coordinates();
        let base =
            SignedInvocation::origin_hash(&circle, &origin, 1, "main", cap_id, "read_stats", 6);

        let other_nonce =
            SignedInvocation::origin_hash(&circle, &origin, 1, "main", cap_id, "read_stats", 7);
        assert_ne!(base, other_nonce);

        let other_method =
            SignedInvocation::origin_hash(&circle, &origin, 1, "main", cap_id, "submit_input", 6);
        assert_ne!(base, other_method);

        let other_epoch =
            SignedInvocation::origin_hash(&circle, &origin, 2, "main", cap_id, "read_stats", 6);
        assert_ne!(base, other_epoch);
    }

    #[test]
    fn test_origin_hash_is_not_payload_hash() {
        let (circle, origin, cap_id) = coordinates();
        let payload = InvocationPayload::Bytes(vec![1, 2, 3]);
        let invocation = SignedInvocation::build(
            &circle,
            &origin,
            1,
            "main",
            cap_id,
            "submit_input",
            6,
            Some(&payload),
        );
        assert_ne!(invocation.header.origin_hash, invocation.body.payload_hash);
        assert_eq!(
            invocation.body.payload_hash,
            Digest::hash(payload.hash_input())
        );
    }

    #[test]
    fn test_opaque_payload_hashed_not_inspected() {
        let (circle, origin, cap_id) = coordinates();
        let payload = InvocationPayload::Opaque {
            scheme: "tfhe-v1".into(),
            ciphertext: vec![0xde, 0xad],
            metadata: serde_json::Value::Null,
        };
        let invocation = SignedInvocation::build(
            &circle,
            &origin,
            1,
            "main",
            cap_id,
            "submit_input",
            6,
            Some(&payload),
        );
        assert_eq!(
            invocation.body.payload_hash,
            Digest::hash(&[0xde, 0xad])
        );
    }

    #[test]
    fn test_missing_payload_hashes_to_zero() {
        let (circle, origin, cap_id) = coordinates();
        let invocation =
            SignedInvocation::build(&circle, &origin, 1, "main", cap_id, "read_stats", 6, None);
        assert!(invocation.body.payload_hash.is_zero());
    }

    #[test]
    fn test_serde_roundtrip() {
        let (circle, origin, cap_id) = coordinates();
        let invocation =
            SignedInvocation::build(&circle, &origin, 1, "main", cap_id, "read_stats", 6, None);
        let json = serde_json::to_string(&invocation).unwrap();
        let back: SignedInvocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.header.origin_hash, invocation.header.origin_hash);
        assert_eq!(back.body.capability_id, invocation.body.capability_id);
    }
}
