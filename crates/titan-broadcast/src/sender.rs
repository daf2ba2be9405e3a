//! Transport abstraction the Broadcaster delivers through. The concrete
//! transport (WebSocket hub, game-server connection table, whatever owns
//! actual sockets) is explicitly out of scope here; this crate only needs
//! somewhere to hand a sealed or plaintext message to a `connection_id`.

use async_trait::async_trait;
use titan_proto::envelope::SecureEnvelope;

#[derive(Debug, thiserror::Error)]
#[error("send to connection failed: {0}")]
pub struct SendFailure(pub String);

#[async_trait]
pub trait ConnectionSender: Send + Sync {
    /// Deliver a sealed envelope addressed to `method_name` on `connection_id`.
    async fn send_sealed(
        &self,
        connection_id: &str,
        method_name: &str,
        envelope: &SecureEnvelope,
    ) -> Result<(), SendFailure>;

    /// Deliver a plaintext payload addressed to `method_name` on `connection_id`.
    async fn send_plain(
        &self,
        connection_id: &str,
        method_name: &str,
        payload: &[u8],
    ) -> Result<(), SendFailure>;
}
