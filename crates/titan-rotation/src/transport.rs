//! The push channel the driver uses to deliver a `KeyRotationRequest` to a
//! user's live connections. The concrete transport is out of scope here;
//! this crate only needs somewhere to hand the request off.

use async_trait::async_trait;
use titan_session::KeyRotationRequest;

#[derive(Debug, thiserror::Error)]
#[error("failed to push rotation request to user {user_id}: {reason}")]
pub struct RotationPushFailure {
    pub user_id: String,
    pub reason: String,
}

#[async_trait]
pub trait RotationTransport: Send + Sync {
    async fn push_rotation_request(
        &self,
        user_id: &str,
        request: &KeyRotationRequest,
    ) -> Result<(), RotationPushFailure>;
}
