//! AES-256-GCM sealing.
//!
//! Key size: 32 bytes. Nonce: 12 bytes, supplied by the caller (this layer
//! never generates its own nonce — nonce construction is the session
//! layer's responsibility). Tag: 16 bytes, returned separately from the
//! ciphertext. AAD is always empty.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use zeroize::Zeroizing;

use crate::error::CryptoFailure;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Seal `plaintext` under `key` and `nonce`. Returns `(ciphertext, tag)`,
/// tag always exactly 16 bytes.
pub fn seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN]), CryptoFailure> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoFailure::AeadEncrypt)?;
    let nonce = Nonce::from_slice(nonce);

    let mut combined = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: b"" })
        .map_err(|_| CryptoFailure::AeadEncrypt)?;

    if combined.len() < TAG_LEN {
        return Err(CryptoFailure::AeadEncrypt);
    }
    let tag_start = combined.len() - TAG_LEN;
    let tag_bytes = combined.split_off(tag_start);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);

    Ok((combined, tag))
}

/// Open `ciphertext`/`tag` sealed by [`seal`]. Any failure is an
/// authentication failure (constant-time, per the underlying AEAD impl).
pub fn open(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Zeroizing<Vec<u8>>, CryptoFailure> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoFailure::AeadDecrypt)?;
    let nonce = Nonce::from_slice(nonce);

    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: &combined, aad: b"" })
        .map_err(|_| CryptoFailure::AeadDecrypt)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_LEN];
        let (ct, tag) = seal(&key, &nonce, b"hello world").unwrap();
        let pt = open(&key, &nonce, &ct, &tag).unwrap();
        assert_eq!(&pt[..], b"hello world");
    }

    #[test]
    fn tampered_tag_rejected() {
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_LEN];
        let (ct, mut tag) = seal(&key, &nonce, b"hello world").unwrap();
        tag[0] ^= 0x01;
        assert!(open(&key, &nonce, &ct, &tag).is_err());
    }

    #[test]
    fn tampered_ciphertext_rejected() {
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_LEN];
        let (mut ct, tag) = seal(&key, &nonce, b"hello world").unwrap();
        ct[0] ^= 0x01;
        assert!(open(&key, &nonce, &ct, &tag).is_err());
    }

    #[test]
    fn wrong_key_rejected() {
        let nonce = [1u8; NONCE_LEN];
        let (ct, tag) = seal(&[7u8; 32], &nonce, b"hello world").unwrap();
        assert!(open(&[8u8; 32], &nonce, &ct, &tag).is_err());
    }
}
