//! Zero-config, in-memory `StateStore`. Used by default and by every test
//! in the crates above this one; sessions do not survive a process restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store_trait::StateStore;

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    signing_key: Option<Vec<u8>>,
    sessions: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_signing_key(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().await.signing_key.clone())
    }

    async fn save_signing_key(&self, key_bytes: &[u8]) -> Result<(), StoreError> {
        self.inner.write().await.signing_key = Some(key_bytes.to_vec());
        Ok(())
    }

    async fn save_session(
        &self,
        user_id: &str,
        state_blob: &[u8],
        _ttl_seconds: u32,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .sessions
            .insert(user_id.to_string(), state_blob.to_vec());
        Ok(())
    }

    async fn load_session(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().await.sessions.get(user_id).cloned())
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError> {
        self.inner.write().await.sessions.remove(user_id);
        Ok(())
    }

    async fn scan_sessions(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_signing_key_and_sessions() {
        let store = MemoryStore::new();
        assert!(store.load_signing_key().await.unwrap().is_none());

        store.save_signing_key(b"secret").await.unwrap();
        assert_eq!(store.load_signing_key().await.unwrap().unwrap(), b"secret");

        store.save_session("u1", b"blob", 86_400).await.unwrap();
        assert_eq!(store.load_session("u1").await.unwrap().unwrap(), b"blob");

        let scanned = store.scan_sessions().await.unwrap();
        assert_eq!(scanned.len(), 1);

        store.delete_session("u1").await.unwrap();
        assert!(store.load_session("u1").await.unwrap().is_none());
    }
}
