use std::sync::Arc;
use std::time::Duration;

use titan_config::TitanConfig;
use titan_crypto::ecdh::EcdhKeyPair;
use titan_crypto::ecdsa::SigningKeyPair;
use titan_session::{RotationAck, SessionFailure, SessionManager};
use titan_store::MemoryStore;

struct Client {
    ecdh: EcdhKeyPair,
    signing: SigningKeyPair,
}

impl Client {
    fn new() -> Self {
        Self {
            ecdh: EcdhKeyPair::generate(),
            signing: SigningKeyPair::generate().unwrap(),
        }
    }
}

async fn manager_with_memory_store() -> SessionManager {
    let store = Arc::new(MemoryStore::new());
    SessionManager::new(TitanConfig::default(), Some(store))
        .await
        .unwrap()
}

async fn handshake(manager: &SessionManager, user_id: &str, client: &Client) {
    manager
        .handshake(
            user_id,
            &client.ecdh.public_spki_der().unwrap(),
            client.signing.public_spki_der(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn round_trip_under_current_key() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "alice", &client).await;

    let envelope = manager.seal("alice", b"hello", None).await.unwrap();
    let plaintext = manager.open("alice", &envelope).await.unwrap();
    assert_eq!(&plaintext[..], b"hello");
}

#[tokio::test]
async fn round_trip_under_previous_key_during_grace() {
    let mut config = TitanConfig::default();
    config.key_rotation_grace_period_seconds = 300;
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(config, Some(store)).await.unwrap();
    let client = Client::new();
    handshake(&manager, "bob", &client).await;

    let old_key_id = manager.stats("bob").await.unwrap().key_id;
    let old_envelope = manager
        .seal("bob", b"pre-rotation", Some(old_key_id.as_str()))
        .await
        .unwrap();

    handshake(&manager, "bob", &client).await;

    let plaintext = manager.open("bob", &old_envelope).await.unwrap();
    assert_eq!(&plaintext[..], b"pre-rotation");
}

#[tokio::test]
async fn nonce_uniqueness_under_same_key() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "carol", &client).await;

    let a = manager.seal("carol", b"one", None).await.unwrap();
    let b = manager.seal("carol", b"two", None).await.unwrap();
    assert_ne!(a.nonce, b.nonce);
}

#[tokio::test]
async fn replay_rejection() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "dave", &client).await;

    let envelope = manager.seal("dave", b"once", None).await.unwrap();
    manager.open("dave", &envelope).await.unwrap();

    let replayed = manager.open("dave", &envelope).await;
    assert!(matches!(replayed, Err(SessionFailure::SequenceRegression)));
}

#[tokio::test]
async fn cross_user_isolation() {
    let manager = manager_with_memory_store().await;
    let alice = Client::new();
    let eve = Client::new();
    handshake(&manager, "alice", &alice).await;
    handshake(&manager, "eve", &eve).await;

    let envelope = manager.seal("alice", b"for alice's ears only", None).await.unwrap();
    let result = manager.open("eve", &envelope).await;
    assert!(matches!(result, Err(SessionFailure::UnknownKey)));
}

#[tokio::test]
async fn grace_correctness() {
    let mut config = TitanConfig::default();
    config.key_rotation_grace_period_seconds = 0;
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(config, Some(store)).await.unwrap();
    let client = Client::new();
    handshake(&manager, "frank", &client).await;

    let old_key_id = manager.stats("frank").await.unwrap().key_id;
    let old_envelope = manager
        .seal("frank", b"late arrival", Some(old_key_id.as_str()))
        .await
        .unwrap();

    handshake(&manager, "frank", &client).await;
    // Immediately after rotation the grace deadline (now + 0s) has
    // already passed by the time we check it.
    tokio::time::sleep(Duration::from_millis(5)).await;

    let result = manager.open("frank", &old_envelope).await;
    assert!(matches!(result, Err(SessionFailure::PreviousKeyExpired)));
}

#[tokio::test]
async fn rotation_monotonicity() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "grace", &client).await;

    manager.seal("grace", b"a", None).await.unwrap();
    manager.seal("grace", b"b", None).await.unwrap();

    let rotation = manager.initiate_rotation("grace").await.unwrap();
    let new_client_ecdh = EcdhKeyPair::generate();
    let new_client_signing = SigningKeyPair::generate().unwrap();
    manager
        .complete_rotation(
            "grace",
            &RotationAck {
                client_ecdh_pub_spki: new_client_ecdh.public_spki_der().unwrap(),
                client_sign_pub_spki: new_client_signing.public_spki_der().to_vec(),
            },
        )
        .await
        .unwrap();

    let envelope = manager.seal("grace", b"after rotation", None).await.unwrap();
    assert_eq!(envelope.key_id, rotation.new_key_id);
    assert_eq!(envelope.sequence_number, 1);
}

#[tokio::test]
async fn tamper_detection_across_fields() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "heidi", &client).await;
    let envelope = manager.seal("heidi", b"integrity matters", None).await.unwrap();

    let mut tampered = envelope.clone();
    tampered.ciphertext[0] ^= 0x01;
    assert!(manager.open("heidi", &tampered).await.is_err());

    let mut tampered = envelope.clone();
    tampered.tag[0] ^= 0x01;
    assert!(manager.open("heidi", &tampered).await.is_err());

    let mut tampered = envelope.clone();
    tampered.nonce[0] ^= 0x01;
    assert!(manager.open("heidi", &tampered).await.is_err());

    let mut tampered = envelope.clone();
    tampered.signature[0] ^= 0x01;
    assert!(manager.open("heidi", &tampered).await.is_err());

    let mut tampered = envelope.clone();
    tampered.timestamp_ms += 1;
    assert!(manager.open("heidi", &tampered).await.is_err());

    let mut tampered = envelope.clone();
    tampered.sequence_number += 1;
    assert!(manager.open("heidi", &tampered).await.is_err());

    let mut tampered = envelope;
    tampered.key_id.push('x');
    assert!(matches!(
        manager.open("heidi", &tampered).await,
        Err(SessionFailure::UnknownKey)
    ));
}

#[tokio::test]
async fn idempotent_rotation_initiation() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "ivan", &client).await;

    let first = manager.initiate_rotation("ivan").await.unwrap();
    let second = manager.initiate_rotation("ivan").await.unwrap();
    assert_eq!(first.new_key_id, second.new_key_id);
    assert_eq!(first.hkdf_salt, second.hkdf_salt);
}

#[tokio::test]
async fn persistence_survivability_across_restart() {
    let store = Arc::new(MemoryStore::new());
    let client = Client::new();

    let envelope = {
        let manager = SessionManager::new(TitanConfig::default(), Some(store.clone()))
            .await
            .unwrap();
        handshake(&manager, "judy", &client).await;
        manager.seal("judy", b"before restart", None).await.unwrap()
    };

    // Simulate a process restart: a fresh manager restores sessions from
    // the same store. `recv_seq_by_key_id` resets, so an envelope with
    // sequence 1 opens successfully even though it was never seen by this
    // manager instance before.
    let restarted = SessionManager::new(TitanConfig::default(), Some(store))
        .await
        .unwrap();
    let plaintext = restarted.open("judy", &envelope).await.unwrap();
    assert_eq!(&plaintext[..], b"before restart");
}

#[tokio::test]
async fn needs_rotation_reflects_message_count_threshold() {
    let mut config = TitanConfig::default();
    config.max_messages_per_key = 2;
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(config, Some(store)).await.unwrap();
    let client = Client::new();
    handshake(&manager, "kevin", &client).await;

    assert!(!manager.needs_rotation("kevin").await);
    manager.seal("kevin", b"1", None).await.unwrap();
    manager.seal("kevin", b"2", None).await.unwrap();
    assert!(manager.needs_rotation("kevin").await);
}

#[tokio::test]
async fn timestamp_outside_window_is_rejected() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "mallory", &client).await;

    let mut future_envelope = manager.seal("mallory", b"from the future", None).await.unwrap();
    future_envelope.timestamp_ms += 10_000; // +10s, beyond the default 5s skew
    assert!(matches!(
        manager.open("mallory", &future_envelope).await,
        Err(SessionFailure::TimestampOutOfWindow)
    ));

    let mut stale_envelope = manager.seal("mallory", b"from the past", None).await.unwrap();
    stale_envelope.timestamp_ms -= 61_000; // beyond the default 60s replay window
    assert!(matches!(
        manager.open("mallory", &stale_envelope).await,
        Err(SessionFailure::TimestampOutOfWindow)
    ));
}

#[tokio::test]
async fn rotation_under_load() {
    let manager = manager_with_memory_store().await;
    let client = Client::new();
    handshake(&manager, "nancy", &client).await;
    let old_key_id = manager.stats("nancy").await.unwrap().key_id;

    let mut pre_rotation_envelopes = Vec::new();
    for i in 0..10 {
        let envelope = manager
            .seal("nancy", format!("pre-{i}").as_bytes(), None)
            .await
            .unwrap();
        pre_rotation_envelopes.push(envelope);
    }

    let rotation = manager.initiate_rotation("nancy").await.unwrap();
    let new_client_ecdh = EcdhKeyPair::generate();
    let new_client_signing = SigningKeyPair::generate().unwrap();
    manager
        .complete_rotation(
            "nancy",
            &RotationAck {
                client_ecdh_pub_spki: new_client_ecdh.public_spki_der().unwrap(),
                client_sign_pub_spki: new_client_signing.public_spki_der().to_vec(),
            },
        )
        .await
        .unwrap();
    assert_eq!(rotation.new_key_id, manager.stats("nancy").await.unwrap().key_id);

    // Two late-arriving envelopes sealed under the old key, delivered after rotation.
    let late_envelopes: Vec<_> = pre_rotation_envelopes.drain(8..).collect();

    let mut post_rotation_envelopes = Vec::new();
    for i in 0..10 {
        let envelope = manager
            .seal("nancy", format!("post-{i}").as_bytes(), None)
            .await
            .unwrap();
        post_rotation_envelopes.push(envelope);
    }

    for envelope in &pre_rotation_envelopes {
        manager.open("nancy", envelope).await.unwrap();
    }
    for envelope in &late_envelopes {
        manager.open("nancy", envelope).await.unwrap();
    }
    for envelope in &post_rotation_envelopes {
        manager.open("nancy", envelope).await.unwrap();
    }

    // `old_key_id` became the grace-window previous key on rotation, so a
    // hinted seal still resolves to it while the grace window is live.
    let trailing = manager
        .seal("nancy", b"trailing under old key hint", Some(old_key_id.as_str()))
        .await
        .unwrap();
    assert_eq!(trailing.key_id, old_key_id);
}

#[tokio::test]
async fn remove_drops_session_and_store_entry() {
    let store = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(TitanConfig::default(), Some(store))
        .await
        .unwrap();
    let client = Client::new();
    handshake(&manager, "laura", &client).await;
    assert!(manager.is_enabled("laura").await);

    manager.remove("laura").await;
    assert!(!manager.is_enabled("laura").await);
    assert!(manager.seal("laura", b"x", None).await.is_err());
}
