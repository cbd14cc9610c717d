//! Cryptographic primitives for PowLedger

use crate::error::LedgerError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Compact ECDSA signature bytes.
pub type SignatureBytes = [u8; COMPACT_SIGNATURE_SIZE];

/// SHA-256 of `data`, lowercase hex encoded (64 characters).
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Returns the public key as a compressed byte array.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key.serialize()
    }

    /// Signs the SHA-256 digest of `message` and returns the compact signature bytes.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let message = Message::from_digest(digest);
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, message, and signature bytes.
///
/// Malformed key or signature encodings are reported as `CryptoError`; a well-formed
/// signature that does not match is `SignatureInvalid`.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), LedgerError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(LedgerError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(LedgerError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| LedgerError::CryptoError(format!("Invalid public key: {}", e)))?;

    let digest: [u8; 32] = Sha256::digest(message).into();
    let message = Message::from_digest(digest);

    let signature = Signature::from_compact(signature_bytes)
        .map_err(|e| LedgerError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| LedgerError::SignatureInvalid)
}
