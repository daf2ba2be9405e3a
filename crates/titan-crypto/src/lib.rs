//! titan-crypto — primitives layer for the encryption core.
//!
//! # Design principles
//! - No custom crypto; every primitive comes from an audited Rust crate.
//! - Secret material is zeroized on drop.
//! - Public APIs return opaque newtypes to prevent accidental misuse.
//!
//! # Module layout
//! - `aead`  — AES-256-GCM seal/open
//! - `ecdh`  — P-256 ECDH keypairs and agreement
//! - `ecdsa` — P-256 ECDSA signing and verification
//! - `kdf`   — HKDF-SHA-256 derivation
//! - `rng`   — CSPRNG helpers, key ids, user-id hashing
//! - `error` — unified failure type

pub mod aead;
pub mod ecdh;
pub mod ecdsa;
pub mod error;
pub mod kdf;
pub mod rng;

pub use error::CryptoFailure;
