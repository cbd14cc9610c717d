//! Participant identities: an id bound to a secp256k1 key pair.

use crate::crypto::{verify_signature, KeyPair};

/// A registered participant's key material.
///
/// The private key never leaves this type; [`Identity::sign`] is the only
/// operation that uses it.
pub struct Identity {
    id: String,
    keypair: KeyPair,
}

impl Identity {
    /// Creates an identity for `id` with a freshly generated key pair.
    pub fn create(id: impl Into<String>) -> Self {
        Identity {
            id: id.into(),
            keypair: KeyPair::generate(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key(&self) -> Vec<u8> {
        self.keypair.public_key_bytes().to_vec()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.keypair.sign(message).to_vec()
    }

    /// Checks `signature` over `message` against this identity's public key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        verify_signature(&self.keypair.public_key_bytes(), message, signature).is_ok()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}
