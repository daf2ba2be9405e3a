use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use titan_config::TitanConfig;
use titan_crypto::ecdh::EcdhKeyPair;
use titan_crypto::ecdsa::SigningKeyPair;
use titan_rotation::{run_sweep, RotationPushFailure, RotationTransport};
use titan_session::{KeyRotationRequest, SessionManager};
use titan_store::MemoryStore;

#[derive(Default)]
struct RecordingTransport {
    pushed: DashMap<String, KeyRotationRequest>,
    push_count: AtomicUsize,
}

#[async_trait]
impl RotationTransport for RecordingTransport {
    async fn push_rotation_request(
        &self,
        user_id: &str,
        request: &KeyRotationRequest,
    ) -> Result<(), RotationPushFailure> {
        self.push_count.fetch_add(1, Ordering::SeqCst);
        self.pushed.insert(user_id.to_string(), request.clone());
        Ok(())
    }
}

async fn handshake(manager: &SessionManager, user_id: &str) {
    let ecdh = EcdhKeyPair::generate();
    let signing = SigningKeyPair::generate().unwrap();
    manager
        .handshake(user_id, &ecdh.public_spki_der().unwrap(), signing.public_spki_der())
        .await
        .unwrap();
}

#[tokio::test]
async fn sweep_rotates_only_users_past_the_message_threshold() {
    let mut config = TitanConfig::default();
    config.max_messages_per_key = 1;
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(SessionManager::new(config, Some(store)).await.unwrap());

    handshake(&manager, "alice").await;
    handshake(&manager, "bob").await;
    manager.seal("alice", b"one message pushes alice over threshold", None).await.unwrap();

    let transport = RecordingTransport::default();
    let report = run_sweep(&manager, &transport).await;

    assert_eq!(report.rotated, 1);
    assert!(transport.pushed.contains_key("alice"));
    assert!(!transport.pushed.contains_key("bob"));
}

#[tokio::test]
async fn sweep_clears_expired_previous_keys() {
    let mut config = TitanConfig::default();
    config.key_rotation_grace_period_seconds = 0;
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(SessionManager::new(config, Some(store)).await.unwrap());
    handshake(&manager, "carol").await;
    handshake(&manager, "carol").await; // second handshake creates a grace-window previous key

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let transport = RecordingTransport::default();
    let report = run_sweep(&manager, &transport).await;
    assert_eq!(report.expired_previous_keys, 1);
}

#[tokio::test]
async fn sweep_is_a_no_op_with_no_sessions() {
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(SessionManager::new(TitanConfig::default(), Some(store)).await.unwrap());
    let transport = RecordingTransport::default();
    let report = run_sweep(&manager, &transport).await;
    assert_eq!(report.rotated, 0);
    assert_eq!(report.expired_previous_keys, 0);
}
