//! ECDSA P-256 / SHA-256 signing and verification.
//!
//! The server's long-term signing key and every client's per-session
//! signing key are both P-256; public keys travel as SPKI DER.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use rand_core::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoFailure;

/// A long-term or per-session ECDSA signing keypair.
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)]
    public_spki_der: Vec<u8>,
    signing_key: SigningKey,
}

impl SigningKeyPair {
    pub fn generate() -> Result<Self, CryptoFailure> {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_spki_der = signing_key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| CryptoFailure::KeyGeneration(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self { public_spki_der, signing_key })
    }

    /// Reconstruct from a raw 32-byte scalar, as persisted by the State Store.
    pub fn from_scalar_bytes(bytes: &[u8]) -> Result<Self, CryptoFailure> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| CryptoFailure::InvalidKey(e.to_string()))?;
        let public_spki_der = signing_key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| CryptoFailure::KeyGeneration(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self { public_spki_der, signing_key })
    }

    pub fn scalar_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    pub fn public_spki_der(&self) -> &[u8] {
        &self.public_spki_der
    }

    /// Sign `message`, returning a fixed-size raw (r||s) signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sig: Signature = self.signing_key.sign(message);
        sig.to_bytes().to_vec()
    }
}

/// Verify a raw (r||s) signature made over `message` by the holder of
/// `public_spki_der`.
pub fn verify(public_spki_der: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoFailure> {
    let verifying_key = VerifyingKey::from_public_key_der(public_spki_der)
        .map_err(|e| CryptoFailure::InvalidKey(e.to_string()))?;
    let sig = Signature::from_slice(signature)
        .map_err(|_| CryptoFailure::SignatureVerification)?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoFailure::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let pair = SigningKeyPair::generate().unwrap();
        let sig = pair.sign(b"message");
        verify(pair.public_spki_der(), b"message", &sig).unwrap();
    }

    #[test]
    fn rejects_tampered_message() {
        let pair = SigningKeyPair::generate().unwrap();
        let sig = pair.sign(b"message");
        assert!(verify(pair.public_spki_der(), b"different", &sig).is_err());
    }

    #[test]
    fn round_trips_scalar_bytes() {
        let pair = SigningKeyPair::generate().unwrap();
        let scalar = pair.scalar_bytes();
        let restored = SigningKeyPair::from_scalar_bytes(&scalar).unwrap();
        assert_eq!(pair.public_spki_der(), restored.public_spki_der());
    }
}
