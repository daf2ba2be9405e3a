//! titan-store — the durable state-store collaborator.
//!
//! # Encryption strategy
//! SQLite does not natively encrypt. Sensitive columns (the server signing
//! key, session crypto state) are stored as AES-256-GCM ciphertext,
//! base64-encoded; everything else that touches this crate is opaque bytes
//! handed to it by `titan-session`.
//!
//! # Migration
//! SQLx migrations in `migrations/` run automatically on `SqliteStore::open`.

pub mod db;
pub mod error;
pub mod key;
pub mod memory;
pub mod migrations;
pub mod store_trait;

pub use db::SqliteStore;
pub use error::StoreError;
pub use key::StoreKey;
pub use memory::MemoryStore;
pub use store_trait::StateStore;
