use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use titan_crypto::ecdh::EcdhKeyPair;
use zeroize::Zeroizing;

/// Per-user cryptographic session state.
///
/// Owned exclusively through `Arc<tokio::sync::Mutex<SessionState>>` by the
/// `SessionManager` — every field here is only ever touched while that lock
/// is held, which is also how the `nonce_counter`/`server_sequence`
/// "atomic fetch-add" requirement is satisfied: the per-session mutex already
/// serializes every path that could race on them, so a plain counter under
/// the lock gives the same guarantee a free-standing `AtomicU64` would, while
/// keeping counter resets (on rotation) trivially race-free against
/// concurrent seals.
pub struct SessionState {
    pub key_id: String,
    pub aes_key: Zeroizing<[u8; 32]>,
    pub hkdf_salt: [u8; 32],
    pub client_signing_pubkey: Vec<u8>,
    pub user_id_hash: [u8; 4],
    pub nonce_counter: u64,
    pub server_sequence: i64,
    pub recv_seq_by_key_id: HashMap<String, i64>,
    pub message_count: u64,
    pub key_created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,

    pub previous_key_id: Option<String>,
    pub previous_aes_key: Option<Zeroizing<[u8; 32]>>,
    pub previous_client_signing_pubkey: Option<Vec<u8>>,
    pub previous_key_expires_at: Option<DateTime<Utc>>,
    /// Nonce counter for the previous key's own nonce space, carried over
    /// from `nonce_counter` at the moment a key is demoted to previous. Seals
    /// under `previous_aes_key` increment this counter, never `nonce_counter`
    /// — the two keys must never share a counter or a late previous-key seal
    /// would reuse a nonce already consumed while that key was current.
    pub previous_nonce_counter: u64,

    pub pending_rotation_key_id: Option<String>,
    pub pending_rotation_ecdh_private: Option<EcdhKeyPair>,
    pub pending_rotation_salt: Option<[u8; 32]>,
}

impl SessionState {
    /// A sentinel "no session yet" value: `key_id` is empty, which is never
    /// a valid key id minted by a handshake. `SessionManager::session_arc_for`
    /// uses this to get-or-create a session slot without needing real key
    /// material up front; `handshake` checks `key_id.is_empty()` to decide
    /// whether it is creating a session or rotating an existing one.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            key_id: String::new(),
            aes_key: Zeroizing::new([0u8; 32]),
            hkdf_salt: [0u8; 32],
            client_signing_pubkey: Vec::new(),
            user_id_hash: [0u8; 4],
            nonce_counter: 0,
            server_sequence: 0,
            recv_seq_by_key_id: HashMap::new(),
            message_count: 0,
            key_created_at: now,
            last_activity_at: now,
            previous_key_id: None,
            previous_aes_key: None,
            previous_client_signing_pubkey: None,
            previous_key_expires_at: None,
            previous_nonce_counter: 0,
            pending_rotation_key_id: None,
            pending_rotation_ecdh_private: None,
            pending_rotation_salt: None,
        }
    }

    /// Zero all current and previous key material and clear rotation state.
    /// Used by `remove` and by grace-expiry cleanup.
    pub fn zero_previous_key(&mut self) {
        self.previous_key_id = None;
        self.previous_aes_key = None;
        self.previous_client_signing_pubkey = None;
        self.previous_key_expires_at = None;
        self.previous_nonce_counter = 0;
    }

    pub fn clear_pending_rotation(&mut self) {
        self.pending_rotation_key_id = None;
        self.pending_rotation_ecdh_private = None;
        self.pending_rotation_salt = None;
    }

    pub fn has_pending_rotation(&self) -> bool {
        self.pending_rotation_key_id.is_some()
    }

    /// Non-secret projection used for persistence. `recv_seq_by_key_id` is
    /// intentionally omitted — restored sessions start it empty (spec §4.3).
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            key_id: self.key_id.clone(),
            aes_key: self.aes_key.to_vec(),
            hkdf_salt: self.hkdf_salt.to_vec(),
            client_signing_pubkey: self.client_signing_pubkey.clone(),
            user_id_hash: self.user_id_hash.to_vec(),
            nonce_counter: self.nonce_counter,
            server_sequence: self.server_sequence,
            message_count: self.message_count,
            key_created_at: self.key_created_at,
            last_activity_at: self.last_activity_at,
            previous_key_id: self.previous_key_id.clone(),
            previous_aes_key: self.previous_aes_key.as_ref().map(|k| k.to_vec()),
            previous_client_signing_pubkey: self.previous_client_signing_pubkey.clone(),
            previous_key_expires_at: self.previous_key_expires_at,
            previous_nonce_counter: self.previous_nonce_counter,
        }
    }
}

/// Serializable projection of `SessionState` persisted to the state store.
/// Never carries `recv_seq_by_key_id` or pending-rotation secrets — a
/// rotation in flight across a process restart is abandoned, which is safe
/// because the client will simply re-handshake (the server never commits to
/// the pending key until `complete_rotation` succeeds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub key_id: String,
    pub aes_key: Vec<u8>,
    pub hkdf_salt: Vec<u8>,
    pub client_signing_pubkey: Vec<u8>,
    pub user_id_hash: Vec<u8>,
    pub nonce_counter: u64,
    pub server_sequence: i64,
    pub message_count: u64,
    pub key_created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub previous_key_id: Option<String>,
    pub previous_aes_key: Option<Vec<u8>>,
    pub previous_client_signing_pubkey: Option<Vec<u8>>,
    pub previous_key_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub previous_nonce_counter: u64,
}

impl PersistedSession {
    /// Rehydrate a `SessionState`. `recv_seq_by_key_id` starts empty — this
    /// is intentional (spec §4.3): the client is expected to re-handshake
    /// on reconnect after a restart long enough to lose sessions anyway, and
    /// restarting empty never weakens the monotonic-sequence guarantee
    /// within a single process lifetime.
    pub fn into_state(self) -> Option<SessionState> {
        let aes_key: [u8; 32] = self.aes_key.try_into().ok()?;
        let hkdf_salt: [u8; 32] = self.hkdf_salt.try_into().ok()?;
        let user_id_hash: [u8; 4] = self.user_id_hash.try_into().ok()?;
        let previous_aes_key = match self.previous_aes_key {
            Some(bytes) => Some(Zeroizing::new(bytes.try_into().ok()?)),
            None => None,
        };
        Some(SessionState {
            key_id: self.key_id,
            aes_key: Zeroizing::new(aes_key),
            hkdf_salt,
            client_signing_pubkey: self.client_signing_pubkey,
            user_id_hash,
            nonce_counter: self.nonce_counter,
            server_sequence: self.server_sequence,
            recv_seq_by_key_id: HashMap::new(),
            message_count: self.message_count,
            key_created_at: self.key_created_at,
            last_activity_at: self.last_activity_at,
            previous_key_id: self.previous_key_id,
            previous_aes_key,
            previous_client_signing_pubkey: self.previous_client_signing_pubkey,
            previous_key_expires_at: self.previous_key_expires_at,
            previous_nonce_counter: self.previous_nonce_counter,
            pending_rotation_key_id: None,
            pending_rotation_ecdh_private: None,
            pending_rotation_salt: None,
        })
    }
}

/// Returned from `SessionManager::handshake`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub key_id: String,
    pub server_ecdh_pub_spki: Vec<u8>,
    pub server_signing_pub_spki: Vec<u8>,
    pub hkdf_salt: Vec<u8>,
    pub grace_period_seconds: u32,
}

/// Returned from `SessionManager::initiate_rotation`, and pushed to the
/// user's connections by the Rotation Driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRotationRequest {
    pub new_key_id: String,
    pub server_ecdh_pub_spki: Vec<u8>,
    pub hkdf_salt: Vec<u8>,
}

/// Client's acknowledgement of a `KeyRotationRequest`, completing the swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationAck {
    pub client_ecdh_pub_spki: Vec<u8>,
    pub client_sign_pub_spki: Vec<u8>,
}

/// Non-secret view of a session, returned from `SessionManager::stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub key_id: String,
    pub message_count: u64,
    pub key_created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}
