//! `SessionManager` — the heart of the encryption core.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use titan_config::TitanConfig;
use titan_crypto::ecdh::{self, EcdhKeyPair};
use titan_crypto::ecdsa::{self, SigningKeyPair};
use titan_crypto::{aead, kdf, rng};
use titan_proto::envelope::SecureEnvelope;
use titan_store::StateStore;

use crate::error::SessionFailure;
use crate::state::{
    HandshakeResponse, KeyRotationRequest, PersistedSession, RotationAck, SessionState,
    SessionStats,
};

/// Per-user session state plus the collaborators every operation needs:
/// the long-term server signing key and the optional durable store.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Mutex<SessionState>>>,
    signing_key: Arc<SigningKeyPair>,
    store: Option<Arc<dyn StateStore>>,
    config: TitanConfig,
}

impl SessionManager {
    /// Load (or generate and persist) the long-term signing key, restore any
    /// sessions from the store, and return a ready-to-use manager. Works
    /// fully in-memory when `store` is `None` (spec §9: persistence is
    /// optional).
    pub async fn new(
        config: TitanConfig,
        store: Option<Arc<dyn StateStore>>,
    ) -> Result<Self, SessionFailure> {
        let signing_key = match &store {
            Some(s) => match s.load_signing_key().await {
                Ok(Some(bytes)) => SigningKeyPair::from_scalar_bytes(&bytes)?,
                Ok(None) => {
                    let generated = SigningKeyPair::generate()?;
                    if let Err(err) = s.save_signing_key(&generated.scalar_bytes()).await {
                        warn!(error = %err, "failed to persist newly generated signing key");
                    }
                    generated
                }
                Err(err) => {
                    warn!(error = %err, "failed to load signing key; generating an ephemeral one");
                    SigningKeyPair::generate()?
                }
            },
            None => SigningKeyPair::generate()?,
        };

        let manager = Self {
            sessions: DashMap::new(),
            signing_key: Arc::new(signing_key),
            store,
            config,
        };
        manager.restore_sessions().await;
        Ok(manager)
    }

    pub fn server_signing_pub_spki(&self) -> Vec<u8> {
        self.signing_key.public_spki_der().to_vec()
    }

    pub fn config(&self) -> &TitanConfig {
        &self.config
    }

    async fn restore_sessions(&self) {
        let Some(store) = &self.store else { return };
        match store.scan_sessions().await {
            Ok(rows) => {
                let mut restored = 0usize;
                for (user_id, blob) in rows {
                    match serde_json::from_slice::<PersistedSession>(&blob) {
                        Ok(persisted) => {
                            if let Some(state) = persisted.into_state() {
                                self.sessions.insert(user_id, Arc::new(Mutex::new(state)));
                                restored += 1;
                            } else {
                                warn!(user_id = %user_id, "persisted session had malformed key material, skipping");
                            }
                        }
                        Err(err) => {
                            warn!(user_id = %user_id, error = %err, "failed to deserialize persisted session, skipping");
                        }
                    }
                }
                info!(restored, "restored sessions from state store");
            }
            Err(err) => warn!(error = %err, "failed to scan persisted sessions on startup"),
        }
    }

    fn session_arc_for(&self, user_id: &str) -> Arc<Mutex<SessionState>> {
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::empty())))
            .clone()
    }

    async fn persist_session(&self, user_id: &str, persisted: &PersistedSession) {
        let Some(store) = &self.store else { return };
        let blob = match serde_json::to_vec(persisted) {
            Ok(b) => b,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to serialize session for persistence");
                return;
            }
        };
        if let Err(err) = store
            .save_session(user_id, &blob, self.config.session_persistence_ttl_seconds)
            .await
        {
            // Persistence is best-effort: spec §4.3 requires the crypto
            // operation that triggered this to succeed regardless.
            warn!(user_id = %user_id, error = %err, "session persistence failed");
        }
    }

    /// Generate an ephemeral ECDH keypair and salt, derive the session key,
    /// install it as current (moving any existing key into the grace slot),
    /// and persist. Idempotent in effect: calling this again simply rotates
    /// the current key into the previous slot once more.
    pub async fn handshake(
        &self,
        user_id: &str,
        client_ecdh_pub_spki: &[u8],
        client_sign_pub_spki: &[u8],
    ) -> Result<HandshakeResponse, SessionFailure> {
        ecdh::validate_public_spki(client_ecdh_pub_spki)?;
        ecdh::validate_public_spki(client_sign_pub_spki)?;

        let server_ephemeral = EcdhKeyPair::generate();
        let server_ecdh_pub_spki = server_ephemeral.public_spki_der()?;
        let shared_secret = server_ephemeral.agree(client_ecdh_pub_spki)?;
        let hkdf_salt = rng::random_salt_32();
        let aes_key = kdf::derive_session_key(&shared_secret, &hkdf_salt, kdf::SESSION_KEY_INFO)?;
        let key_id = rng::new_key_id();
        let now = Utc::now();
        let grace = self.config.key_rotation_grace_period_seconds;

        let session_arc = self.session_arc_for(user_id);
        let persisted = {
            let mut state = session_arc.lock().await;
            if !state.key_id.is_empty() {
                state.previous_key_id = Some(state.key_id.clone());
                state.previous_aes_key = Some(state.aes_key.clone());
                state.previous_client_signing_pubkey = Some(state.client_signing_pubkey.clone());
                state.previous_key_expires_at =
                    Some(now + ChronoDuration::seconds(grace as i64));
                state.previous_nonce_counter = state.nonce_counter;
            }
            state.key_id = key_id.clone();
            state.aes_key = aes_key;
            state.hkdf_salt = hkdf_salt;
            state.client_signing_pubkey = client_sign_pub_spki.to_vec();
            state.user_id_hash = rng::user_id_hash(user_id);
            state.nonce_counter = 0;
            state.server_sequence = 0;
            state.message_count = 0;
            state.key_created_at = now;
            state.last_activity_at = now;
            state.clear_pending_rotation();
            state.to_persisted()
        };
        self.persist_session(user_id, &persisted).await;

        debug!(user_id = %user_id, key_id = %key_id, "handshake complete");
        Ok(HandshakeResponse {
            key_id,
            server_ecdh_pub_spki,
            server_signing_pub_spki: self.signing_key.public_spki_der().to_vec(),
            hkdf_salt: hkdf_salt.to_vec(),
            grace_period_seconds: grace,
        })
    }

    /// Seal `plaintext` under the user's current key, or the previous key
    /// when `key_id_hint` names it and its grace window is still live.
    pub async fn seal(
        &self,
        user_id: &str,
        plaintext: &[u8],
        key_id_hint: Option<&str>,
    ) -> Result<SecureEnvelope, SessionFailure> {
        let session_arc = self
            .sessions
            .get(user_id)
            .map(|e| e.clone())
            .ok_or(SessionFailure::NoSession)?;
        let mut state = session_arc.lock().await;
        if state.key_id.is_empty() {
            return Err(SessionFailure::NoSession);
        }

        let now = Utc::now();
        let grace_live = state
            .previous_key_expires_at
            .map(|exp| exp > now)
            .unwrap_or(false);
        let use_previous = grace_live
            && key_id_hint
                .map(|hint| state.previous_key_id.as_deref() == Some(hint))
                .unwrap_or(false);

        let (key_id, aes_key) = if use_previous {
            (
                state.previous_key_id.clone().unwrap(),
                state.previous_aes_key.as_ref().unwrap().clone(),
            )
        } else {
            (state.key_id.clone(), state.aes_key.clone())
        };

        // The previous key keeps its own counter (carried over from
        // `nonce_counter` at the moment it was demoted) so a late grace-window
        // seal never reuses a nonce already consumed while that key was
        // current.
        let nonce_counter = if use_previous {
            state.previous_nonce_counter += 1;
            state.previous_nonce_counter
        } else {
            state.nonce_counter += 1;
            state.nonce_counter
        };
        let mut nonce = [0u8; aead::NONCE_LEN];
        nonce[0..4].copy_from_slice(&state.user_id_hash);
        nonce[4..12].copy_from_slice(&nonce_counter.to_le_bytes());

        let (ciphertext, tag) = aead::seal(&aes_key, &nonce, plaintext)?;

        state.server_sequence += 1;
        let sequence_number = state.server_sequence;
        let timestamp_ms = now.timestamp_millis();

        let mut envelope = SecureEnvelope {
            key_id,
            nonce,
            ciphertext,
            tag,
            signature: Vec::new(),
            timestamp_ms,
            sequence_number,
        };
        let signing_bytes = envelope.canonical_signing_bytes();
        envelope.signature = self.signing_key.sign(&signing_bytes);

        state.message_count += 1;
        state.last_activity_at = now;

        Ok(envelope)
    }

    /// Validate, verify, and decrypt an inbound envelope, following the
    /// rejection order documented for `open` (key lookup, expiry, replay
    /// window, sequence, signature, then decryption).
    pub async fn open(
        &self,
        user_id: &str,
        envelope: &SecureEnvelope,
    ) -> Result<Zeroizing<Vec<u8>>, SessionFailure> {
        let session_arc = self
            .sessions
            .get(user_id)
            .map(|e| e.clone())
            .ok_or(SessionFailure::NoSession)?;
        let mut state = session_arc.lock().await;
        if state.key_id.is_empty() {
            return Err(SessionFailure::NoSession);
        }

        let is_current = envelope.key_id == state.key_id;
        let is_previous = state.previous_key_id.as_deref() == Some(envelope.key_id.as_str());
        if !is_current && !is_previous {
            return Err(SessionFailure::UnknownKey);
        }
        if is_previous {
            let expired = state
                .previous_key_expires_at
                .map(|exp| exp <= Utc::now())
                .unwrap_or(true);
            if expired {
                state.zero_previous_key();
                return Err(SessionFailure::PreviousKeyExpired);
            }
        }

        let now = Utc::now();
        let replay_window = ChronoDuration::seconds(self.config.replay_window_seconds as i64);
        let skew = ChronoDuration::seconds(self.config.clock_skew_seconds as i64);
        let envelope_time = DateTime::<Utc>::from_timestamp_millis(envelope.timestamp_ms)
            .ok_or(SessionFailure::TimestampOutOfWindow)?;
        if envelope_time < now - replay_window || envelope_time > now + skew {
            return Err(SessionFailure::TimestampOutOfWindow);
        }

        let last_seq = state
            .recv_seq_by_key_id
            .get(&envelope.key_id)
            .copied()
            .unwrap_or(0);
        if envelope.sequence_number <= last_seq {
            return Err(SessionFailure::SequenceRegression);
        }

        let signing_pubkey = if is_current {
            state.client_signing_pubkey.clone()
        } else {
            state
                .previous_client_signing_pubkey
                .clone()
                .ok_or(SessionFailure::UnknownKey)?
        };
        let signing_bytes = envelope.canonical_signing_bytes();
        ecdsa::verify(&signing_pubkey, &signing_bytes, &envelope.signature)
            .map_err(|_| SessionFailure::InvalidSignature)?;

        let aes_key = if is_current {
            state.aes_key.clone()
        } else {
            state
                .previous_aes_key
                .as_ref()
                .ok_or(SessionFailure::UnknownKey)?
                .clone()
        };
        let plaintext = aead::open(&aes_key, &envelope.nonce, &envelope.ciphertext, &envelope.tag)
            .map_err(|_| SessionFailure::InvalidTag)?;

        state
            .recv_seq_by_key_id
            .insert(envelope.key_id.clone(), envelope.sequence_number);
        state.message_count += 1;
        state.last_activity_at = now;

        Ok(plaintext)
    }

    /// Stash a fresh ephemeral ECDH keypair and salt as the pending rotation.
    /// Idempotent: a second call before `complete_rotation` returns the same
    /// pending values.
    pub async fn initiate_rotation(
        &self,
        user_id: &str,
    ) -> Result<KeyRotationRequest, SessionFailure> {
        let session_arc = self
            .sessions
            .get(user_id)
            .map(|e| e.clone())
            .ok_or(SessionFailure::NoSession)?;
        let mut state = session_arc.lock().await;
        if state.key_id.is_empty() {
            return Err(SessionFailure::NoSession);
        }

        if let Some(pending_id) = state.pending_rotation_key_id.clone() {
            let server_ecdh_pub_spki = state
                .pending_rotation_ecdh_private
                .as_ref()
                .expect("pending_rotation_key_id implies pending_rotation_ecdh_private")
                .public_spki_der()?;
            let hkdf_salt = state
                .pending_rotation_salt
                .expect("pending_rotation_key_id implies pending_rotation_salt")
                .to_vec();
            return Ok(KeyRotationRequest {
                new_key_id: pending_id,
                server_ecdh_pub_spki,
                hkdf_salt,
            });
        }

        let ephemeral = EcdhKeyPair::generate();
        let server_ecdh_pub_spki = ephemeral.public_spki_der()?;
        let salt = rng::random_salt_32();
        let new_key_id = rng::new_key_id();

        state.pending_rotation_key_id = Some(new_key_id.clone());
        state.pending_rotation_ecdh_private = Some(ephemeral);
        state.pending_rotation_salt = Some(salt);

        Ok(KeyRotationRequest {
            new_key_id,
            server_ecdh_pub_spki,
            hkdf_salt: salt.to_vec(),
        })
    }

    /// Complete a pending rotation: derive the new key from the client's
    /// acknowledgement, swap current into the grace slot, install the new
    /// key as current, and persist.
    pub async fn complete_rotation(
        &self,
        user_id: &str,
        ack: &RotationAck,
    ) -> Result<(), SessionFailure> {
        ecdh::validate_public_spki(&ack.client_ecdh_pub_spki)?;
        ecdh::validate_public_spki(&ack.client_sign_pub_spki)?;

        let session_arc = self
            .sessions
            .get(user_id)
            .map(|e| e.clone())
            .ok_or(SessionFailure::NoSession)?;
        let persisted = {
            let mut state = session_arc.lock().await;
            let pending_ecdh = state
                .pending_rotation_ecdh_private
                .take()
                .ok_or(SessionFailure::NoPendingRotation)?;
            let pending_salt = state
                .pending_rotation_salt
                .take()
                .ok_or(SessionFailure::NoPendingRotation)?;
            let pending_key_id = state
                .pending_rotation_key_id
                .take()
                .ok_or(SessionFailure::NoPendingRotation)?;

            let shared_secret = pending_ecdh.agree(&ack.client_ecdh_pub_spki)?;
            let new_aes_key =
                kdf::derive_session_key(&shared_secret, &pending_salt, kdf::SESSION_KEY_INFO)?;

            let now = Utc::now();
            let grace = self.config.key_rotation_grace_period_seconds;

            state.previous_key_id = Some(state.key_id.clone());
            state.previous_aes_key = Some(state.aes_key.clone());
            state.previous_client_signing_pubkey = Some(state.client_signing_pubkey.clone());
            state.previous_key_expires_at = Some(now + ChronoDuration::seconds(grace as i64));
            state.previous_nonce_counter = state.nonce_counter;

            state.key_id = pending_key_id;
            state.aes_key = new_aes_key;
            state.hkdf_salt = pending_salt;
            state.client_signing_pubkey = ack.client_sign_pub_spki.clone();
            state.nonce_counter = 0;
            state.server_sequence = 0;
            state.message_count = 0;
            state.key_created_at = now;
            state.last_activity_at = now;
            state.clear_pending_rotation();

            state.to_persisted()
        };
        self.persist_session(user_id, &persisted).await;
        Ok(())
    }

    pub async fn needs_rotation(&self, user_id: &str) -> bool {
        let Some(session_arc) = self.sessions.get(user_id).map(|e| e.clone()) else {
            return false;
        };
        let state = session_arc.lock().await;
        if state.key_id.is_empty() {
            return false;
        }
        let rotation_interval = ChronoDuration::minutes(self.config.rotation_interval_minutes as i64);
        Utc::now() - state.key_created_at >= rotation_interval
            || state.message_count >= self.config.max_messages_per_key
    }

    /// Zero any previous-key material past its grace deadline, across every
    /// session. Called by the Rotation Driver and defensively from `open`.
    pub async fn cleanup_expired_previous_keys(&self) -> usize {
        let now = Utc::now();
        let mut count = 0usize;
        let user_ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for user_id in user_ids {
            let Some(session_arc) = self.sessions.get(&user_id).map(|e| e.clone()) else {
                continue;
            };
            let mut state = session_arc.lock().await;
            if let Some(expires_at) = state.previous_key_expires_at {
                if expires_at <= now {
                    state.zero_previous_key();
                    count += 1;
                }
            }
        }
        count
    }

    pub async fn remove(&self, user_id: &str) {
        if let Some((_, session_arc)) = self.sessions.remove(user_id) {
            let mut state = session_arc.lock().await;
            state.aes_key = Zeroizing::new([0u8; 32]);
            state.zero_previous_key();
            state.clear_pending_rotation();
        }
        if let Some(store) = &self.store {
            if let Err(err) = store.delete_session(user_id).await {
                warn!(user_id = %user_id, error = %err, "failed to delete persisted session");
            }
        }
    }

    pub async fn stats(&self, user_id: &str) -> Option<SessionStats> {
        let session_arc = self.sessions.get(user_id)?.clone();
        let state = session_arc.lock().await;
        if state.key_id.is_empty() {
            return None;
        }
        Some(SessionStats {
            key_id: state.key_id.clone(),
            message_count: state.message_count,
            key_created_at: state.key_created_at,
            last_activity_at: state.last_activity_at,
        })
    }

    pub async fn is_enabled(&self, user_id: &str) -> bool {
        self.stats(user_id).await.is_some()
    }

    /// Snapshot of every user id with live session state. Used by the
    /// Rotation Driver to find candidates for `needs_rotation`.
    pub fn user_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}
