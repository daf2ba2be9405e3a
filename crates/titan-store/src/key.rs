//! At-rest encryption key for persisted session blobs and the server
//! signing key.
//!
//! Unlike a desktop vault, this store has no interactive human unlocking
//! it, so the key is derived once at startup from an operator-supplied
//! passphrase (env var / secret manager) via HKDF-SHA-256, not Argon2id —
//! there is no password-guessing surface to slow down here, the passphrase
//! is already a high-entropy secret.

use titan_crypto::kdf::hkdf_expand;
use titan_crypto::CryptoFailure;
use zeroize::ZeroizeOnDrop;

const STORE_KEY_SALT: &[u8] = b"titan-store-at-rest-v1";
const STORE_KEY_INFO: &[u8] = b"titan-store-at-rest-key";

#[derive(ZeroizeOnDrop)]
pub struct StoreKey(pub [u8; 32]);

impl StoreKey {
    pub fn from_passphrase(passphrase: &[u8]) -> Result<Self, CryptoFailure> {
        let mut out = [0u8; 32];
        hkdf_expand(passphrase, Some(STORE_KEY_SALT), STORE_KEY_INFO, &mut out)?;
        Ok(Self(out))
    }
}
