//! Signing collaborator for ledger hashes.
//!
//! The ledger core never depends on this crate. Callers use it to sign a mined
//! block hash (or any other message) and to check such signatures later.

use rand::thread_rng;
use rsa::{
    pkcs1v15::{Signature as RsaSignature, SigningKey, VerifyingKey},
    signature::{RandomizedSigner, SignatureEncoding, Verifier},
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

/// Key size used when the caller has no preference.
pub const DEFAULT_KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] rsa::Error),
    #[error("signing failed: {0}")]
    Signing(rsa::signature::Error),
    #[error("malformed signature: {0}")]
    MalformedSignature(rsa::signature::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Raw signature bytes as produced by a [`SignatureScheme`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct KeyPair<S: SignatureScheme> {
    pub private_key: S::PrivateKey,
    pub public_key: S::PublicKey,
}

/// An asymmetric signature scheme: key generation, signing and verification.
pub trait SignatureScheme: Sized {
    type PrivateKey: Clone + std::fmt::Debug;
    type PublicKey: Clone + std::fmt::Debug;

    fn generate_key_pair(bits: usize) -> Result<KeyPair<Self>, CryptoError>;

    fn sign(private_key: &Self::PrivateKey, message: &[u8]) -> Result<Signature, CryptoError>;

    fn verify(
        public_key: &Self::PublicKey,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), CryptoError>;
}

/// RSA with PKCS#1 v1.5 padding over a SHA-256 digest of the message.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rsa;

impl SignatureScheme for Rsa {
    type PrivateKey = RsaPrivateKey;
    type PublicKey = RsaPublicKey;

    fn generate_key_pair(bits: usize) -> Result<KeyPair<Self>, CryptoError> {
        debug!(bits, "generating RSA key pair");
        let private_key = RsaPrivateKey::new(&mut thread_rng(), bits)?;
        let public_key = private_key.to_public_key();
        Ok(KeyPair {
            private_key,
            public_key,
        })
    }

    fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Signature, CryptoError> {
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        let signature = signing_key
            .try_sign_with_rng(&mut thread_rng(), message)
            .map_err(CryptoError::Signing)?;
        Ok(Signature(signature.to_vec()))
    }

    fn verify(
        public_key: &RsaPublicKey,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
        let signature = RsaSignature::try_from(signature.as_bytes())
            .map_err(CryptoError::MalformedSignature)?;
        verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    // Small keys keep key generation fast in debug builds.
    const TEST_KEY_BITS: usize = 1024;

    fn key_pair() -> &'static KeyPair<Rsa> {
        static KEYS: OnceLock<KeyPair<Rsa>> = OnceLock::new();
        KEYS.get_or_init(|| Rsa::generate_key_pair(TEST_KEY_BITS).unwrap())
    }

    const HASH_HEX: &[u8] = b"00deb2d97b65d0276ae5b70a3c643ddab69786ece08af63e0c7a2e121715f57d";

    #[test]
    fn sign_then_verify() {
        let keys = key_pair();
        let signature = Rsa::sign(&keys.private_key, HASH_HEX).unwrap();
        assert_eq!(signature.as_bytes().len(), TEST_KEY_BITS / 8);
        assert_eq!(signature.to_hex().len(), TEST_KEY_BITS / 4);
        Rsa::verify(&keys.public_key, HASH_HEX, &signature).unwrap();
    }

    #[test]
    fn signing_is_deterministic() {
        let keys = key_pair();
        let first = Rsa::sign(&keys.private_key, HASH_HEX).unwrap();
        let second = Rsa::sign(&keys.private_key, HASH_HEX).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn verify_rejects_other_message() {
        let keys = key_pair();
        let signature = Rsa::sign(&keys.private_key, HASH_HEX).unwrap();
        let err = Rsa::verify(&keys.public_key, b"tampered", &signature).unwrap_err();
        assert!(matches!(err, CryptoError::VerificationFailed));
    }

    #[test]
    fn verify_rejects_flipped_signature_bit() {
        let keys = key_pair();
        let mut signature = Rsa::sign(&keys.private_key, HASH_HEX).unwrap();
        signature.0[10] ^= 0x01;
        assert!(Rsa::verify(&keys.public_key, HASH_HEX, &signature).is_err());
    }

    #[test]
    fn verify_rejects_empty_signature() {
        let keys = key_pair();
        let err = Rsa::verify(&keys.public_key, HASH_HEX, &Signature(vec![])).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::MalformedSignature(_) | CryptoError::VerificationFailed
        ));
    }

    #[test]
    fn key_generation_reports_failure() {
        let err = Rsa::generate_key_pair(0).unwrap_err();
        assert!(matches!(err, CryptoError::KeyGeneration(_)));
    }
}
