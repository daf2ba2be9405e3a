//! titan-session — the per-user cryptographic session manager.
//!
//! Owns `SessionState` for every authenticated user: handshake, seal/open,
//! key rotation with a grace window, cleanup, and non-secret stats. Every
//! state transition for a given user is serialized by that user's
//! `tokio::sync::Mutex`; persistence to the state store is best-effort and
//! never fails the crypto operation it accompanies.

pub mod error;
pub mod manager;
pub mod state;

pub use error::SessionFailure;
pub use manager::SessionManager;
pub use state::{
    HandshakeResponse, KeyRotationRequest, PersistedSession, RotationAck, SessionState,
    SessionStats,
};
