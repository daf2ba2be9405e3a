//! The durable key/value collaborator the encryption core depends on.
//!
//! Persistence is best-effort and optional: the Session Manager MUST work
//! with no store configured at all (`Option<Arc<dyn StateStore>>`).

use async_trait::async_trait;

use crate::error::StoreError;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_signing_key(&self) -> Result<Option<Vec<u8>>, StoreError>;

    async fn save_signing_key(&self, key_bytes: &[u8]) -> Result<(), StoreError>;

    /// Upsert a session blob with a TTL in seconds.
    async fn save_session(
        &self,
        user_id: &str,
        state_blob: &[u8],
        ttl_seconds: u32,
    ) -> Result<(), StoreError>;

    async fn load_session(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError>;

    /// Used only on startup, to repopulate the in-memory session table.
    async fn scan_sessions(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}
