//! The vault boundary.
//!
//! Capability issuance needs signatures from the wallet's identity key, but
//! this protocol core never reads private key material. Everything it may do
//! with the key is behind [`Vault`].

use crate::keypair::{KeyPair, PublicKey};
use crate::signature::Signature;

/// The narrow interface to the wallet's key storage.
///
/// Implementations hold the private key; callers only ever get signatures
/// and the public key out.
pub trait Vault: Send + Sync {
    /// Sign a message with the wallet's identity key.
    fn sign(&self, message: &[u8]) -> Signature;

    /// The identity key's public half.
    fn public_key(&self) -> PublicKey;
}

/// An in-process vault backed by a [`KeyPair`].
///
/// Production deployments put password-encrypted key storage behind the
/// [`Vault`] trait instead; this implementation serves the broker's tests
/// and single-process embeddings.
pub struct SoftwareVault {
    keypair: KeyPair,
}

impl SoftwareVault {
    /// Create a vault around an existing key pair.
    #[must_use]
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }

    /// Create a vault with a freshly generated key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(KeyPair::generate())
    }
}

impl Vault for SoftwareVault {
    fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }

    fn public_key(&self) -> PublicKey {
        self.keypair.export_public_key()
    }
}

impl std::fmt::Debug for SoftwareVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareVault")
            .field("public_key", &self.keypair.export_public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_vault_signs() {
        let vault = SoftwareVault::generate();
        let message = b"issue capability";
        let sig = vault.sign(message);
        assert!(vault.public_key().verify(message, &sig).is_ok());
    }

    #[test]
    fn test_vault_as_trait_object() {
        let vault: Box<dyn Vault> = Box::new(SoftwareVault::generate());
        let sig = vault.sign(b"msg");
        assert!(vault.public_key().verify(b"msg", &sig).is_ok());
    }
}
