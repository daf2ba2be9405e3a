//! HKDF-SHA-256 key derivation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoFailure;

/// Fixed info string used for deriving a session's AEAD key from an ECDH
/// shared secret.
pub const SESSION_KEY_INFO: &[u8] = b"titan-encryption-key";

/// `HKDF-Expand(salt, shared_secret, info, 32)`.
///
/// `salt` is used as the HKDF extract salt (not the `info` parameter); this
/// matches the handshake's per-session random `hkdf_salt`.
pub fn derive_session_key(
    shared_secret: &[u8],
    salt: &[u8; 32],
    info: &[u8],
) -> Result<Zeroizing<[u8; 32]>, CryptoFailure> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared_secret);
    let mut output = [0u8; 32];
    hk.expand(info, &mut output)
        .map_err(|e| CryptoFailure::KeyDerivation(e.to_string()))?;
    Ok(Zeroizing::new(output))
}

/// Generic HKDF expand for callers that need other info strings or output
/// lengths (e.g. store-at-rest key derivation).
pub fn hkdf_expand(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), CryptoFailure> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    hk.expand(info, output)
        .map_err(|e| CryptoFailure::KeyDerivation(e.to_string()))
}
