//! CSPRNG helpers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// `n` cryptographically random bytes.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// A fresh random 32-byte HKDF salt.
pub fn random_salt_32() -> [u8; 32] {
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// `base64url(random_bytes(16))`, opaque key identifier.
pub fn new_key_id() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(16))
}

/// Deterministic 4-byte SHA-256 prefix of a user id, used as the fixed
/// prefix of that user's outbound nonces.
pub fn user_id_hash(user_id: &str) -> [u8; 4] {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}
