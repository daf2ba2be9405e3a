//! titan-proto — wire types and canonical signing for the encryption core.
//!
//! # Modules
//! - `envelope`   — `SecureEnvelope`, canonical signing bytes, compact + JSON codecs
//! - `invocation` — `EncryptedInvocation`, dual-flavor ingress decode
//! - `varint`     — 7-bit LE varint helper used by both
//! - `error`      — codec error type

pub mod envelope;
pub mod error;
pub mod invocation;
pub mod varint;

pub use envelope::SecureEnvelope;
pub use error::CodecError;
pub use invocation::{decode_invocation, EncryptedInvocation};
