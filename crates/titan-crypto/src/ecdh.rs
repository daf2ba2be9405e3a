//! ECDH key agreement on P-256.
//!
//! Public keys are exchanged as SPKI DER, matching what browser/native
//! WebCrypto clients produce for `ECDH` keypairs.

use p256::ecdh::diffie_hellman;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::{PublicKey, SecretKey};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::error::CryptoFailure;

/// An ephemeral ECDH keypair. The private scalar is zeroized on drop by
/// `p256::SecretKey` itself.
pub struct EcdhKeyPair {
    secret: SecretKey,
}

impl EcdhKeyPair {
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// SPKI DER encoding of the public half.
    pub fn public_spki_der(&self) -> Result<Vec<u8>, CryptoFailure> {
        self.secret
            .public_key()
            .to_public_key_der()
            .map(|der| der.as_bytes().to_vec())
            .map_err(|e| CryptoFailure::KeyGeneration(e.to_string()))
    }

    /// Agree with a peer's SPKI DER public key, producing the 32-byte raw
    /// shared secret (the x-coordinate of the ECDH result).
    pub fn agree(&self, peer_spki_der: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoFailure> {
        let peer_public = PublicKey::from_public_key_der(peer_spki_der)
            .map_err(|e| CryptoFailure::InvalidKey(e.to_string()))?;

        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer_public.as_affine());
        let bytes = shared.raw_secret_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes.as_slice());
        Ok(Zeroizing::new(out))
    }
}

/// Validate that `spki_der` is a well-formed P-256 public key, without
/// needing a keypair to agree against it. Used to validate client-supplied
/// handshake material eagerly.
pub fn validate_public_spki(spki_der: &[u8]) -> Result<(), CryptoFailure> {
    PublicKey::from_public_key_der(spki_der)
        .map(|_| ())
        .map_err(|e| CryptoFailure::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_is_symmetric() {
        let a = EcdhKeyPair::generate();
        let b = EcdhKeyPair::generate();

        let a_pub = a.public_spki_der().unwrap();
        let b_pub = b.public_spki_der().unwrap();

        let secret_from_a = a.agree(&b_pub).unwrap();
        let secret_from_b = b.agree(&a_pub).unwrap();

        assert_eq!(*secret_from_a, *secret_from_b);
    }

    #[test]
    fn rejects_garbage_spki() {
        let a = EcdhKeyPair::generate();
        assert!(a.agree(&[0u8; 10]).is_err());
    }
}
