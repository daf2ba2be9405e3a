//! `SqliteStore` — a `StateStore` backed by SQLite via sqlx.
//!
//! Session blobs and the signing key are encrypted at rest with
//! AES-256-GCM under a store-local key (see `key`), base64-encoded before
//! being written to TEXT columns.

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use titan_crypto::aead;

use crate::error::StoreError;
use crate::key::StoreKey;
use crate::store_trait::StateStore;

/// Central store handle. Cheap to clone (the pool is internally `Arc`'d).
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    key: std::sync::Arc<StoreKey>,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `db_path` and run pending
    /// migrations.
    ///
    /// WAL journal mode is set on the connection options, not inside a
    /// migration — SQLite forbids changing `journal_mode` inside a
    /// transaction, and sqlx wraps every migration in one.
    pub async fn open(db_path: &Path, key: StoreKey) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self { pool, key: std::sync::Arc::new(key) })
    }

    fn encrypt_value(&self, plaintext: &[u8]) -> Result<String, StoreError> {
        let nonce_bytes = titan_crypto::rng::random_bytes(aead::NONCE_LEN);
        let mut nonce = [0u8; aead::NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);

        let (ciphertext, tag) = aead::seal(&self.key.0, &nonce, plaintext).map_err(StoreError::Crypto)?;

        let mut combined = Vec::with_capacity(aead::NONCE_LEN + ciphertext.len() + aead::TAG_LEN);
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        combined.extend_from_slice(&tag);
        Ok(URL_SAFE_NO_PAD.encode(combined))
    }

    fn decrypt_value(&self, encoded: &str) -> Result<Vec<u8>, StoreError> {
        let combined = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| StoreError::Crypto(titan_crypto::CryptoFailure::Base64Decode(e)))?;
        if combined.len() < aead::NONCE_LEN + aead::TAG_LEN {
            return Err(StoreError::NotFound("encrypted value too short".into()));
        }
        let (nonce_bytes, rest) = combined.split_at(aead::NONCE_LEN);
        let (ciphertext, tag_bytes) = rest.split_at(rest.len() - aead::TAG_LEN);

        let mut nonce = [0u8; aead::NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        let mut tag = [0u8; aead::TAG_LEN];
        tag.copy_from_slice(tag_bytes);

        let plaintext = aead::open(&self.key.0, &nonce, ciphertext, &tag).map_err(StoreError::Crypto)?;
        Ok(plaintext.to_vec())
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load_signing_key(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT key_material_enc FROM signing_key WHERE id = 0")
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(enc,)| self.decrypt_value(&enc)).transpose()
    }

    async fn save_signing_key(&self, key_bytes: &[u8]) -> Result<(), StoreError> {
        let enc = self.encrypt_value(key_bytes)?;
        sqlx::query(
            "INSERT INTO signing_key (id, key_material_enc, created_at) VALUES (0, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET key_material_enc = excluded.key_material_enc",
        )
        .bind(enc)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_session(
        &self,
        user_id: &str,
        state_blob: &[u8],
        ttl_seconds: u32,
    ) -> Result<(), StoreError> {
        let enc = self.encrypt_value(state_blob)?;
        let expires_at = Utc::now() + ChronoDuration::seconds(ttl_seconds as i64);
        sqlx::query(
            "INSERT INTO sessions (user_id, state_blob_enc, expires_at, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET state_blob_enc = excluded.state_blob_enc, \
             expires_at = excluded.expires_at, updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(enc)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_session(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT state_blob_enc, expires_at FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((enc, expires_at)) => {
                let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                if expires_at < Utc::now() {
                    return Ok(None);
                }
                Ok(Some(self.decrypt_value(&enc)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scan_sessions(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT user_id, state_blob_enc, expires_at FROM sessions")
                .fetch_all(&self.pool)
                .await?;
        let now = Utc::now();
        let mut out = Vec::with_capacity(rows.len());
        for (user_id, enc, expires_at) in rows {
            let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now);
            if expires_at < now {
                continue;
            }
            out.push((user_id, self.decrypt_value(&enc)?));
        }
        Ok(out)
    }
}
