//! `InvocationGateway` — the single entry point for encrypted hub calls.

use std::sync::Arc;

use titan_proto::envelope::SecureEnvelope;
use titan_proto::invocation::decode_invocation;
use titan_session::SessionManager;
use tracing::warn;

use crate::enforcement::{enforce, CallKind};
use crate::error::GatewayFailure;
use crate::registry::{HandlerRegistry, RESERVED_HANDLER_NAME};

/// Wraps a `SessionManager` and a hub's `HandlerRegistry`, implementing the
/// encrypted dispatch path (`dispatch_encrypted`) and the enforcement-gated
/// plaintext path (`dispatch_plain`) that business hubs call from their
/// transport-level request handlers.
pub struct InvocationGateway {
    session_manager: Arc<SessionManager>,
    registry: HandlerRegistry,
}

impl InvocationGateway {
    pub fn new(session_manager: Arc<SessionManager>, registry: HandlerRegistry) -> Self {
        Self { session_manager, registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.session_manager
    }

    /// Decrypt, dispatch, and re-seal a call delivered to the reserved
    /// `"__encrypted__"` handler. `raw_envelope` is accepted in either the
    /// compact binary or JSON encoding.
    pub async fn dispatch_encrypted(
        &self,
        user_id: Option<&str>,
        raw_envelope: &[u8],
    ) -> Result<Option<Vec<u8>>, GatewayFailure> {
        let user_id = user_id.ok_or(GatewayFailure::AuthRequired)?;

        let envelope = SecureEnvelope::decode_compact(raw_envelope)
            .or_else(|_| SecureEnvelope::decode_json(raw_envelope))
            .map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;

        let plaintext = self.session_manager.open(user_id, &envelope).await?;

        let invocation =
            decode_invocation(&plaintext).map_err(|_| GatewayFailure::ArgumentDecodeFailure)?;
        if invocation.target == RESERVED_HANDLER_NAME {
            return Err(GatewayFailure::InvocationTargetMissing);
        }
        let handler = self
            .registry
            .get(&invocation.target)
            .ok_or(GatewayFailure::InvocationTargetMissing)?;

        let result = handler(invocation.payload).await?;

        match result {
            Some(bytes) => {
                let sealed = self
                    .session_manager
                    .seal(user_id, &bytes, Some(envelope.key_id.as_str()))
                    .await?;
                Ok(Some(sealed.encode_compact()))
            }
            None => Ok(None),
        }
    }

    /// Dispatch a bare (unencrypted) call, subject to the enforcement
    /// policy's allow/deny decision.
    pub async fn dispatch_plain(
        &self,
        user_id: Option<&str>,
        handler_name: &str,
        payload: &[u8],
    ) -> Result<Option<Vec<u8>>, GatewayFailure> {
        if handler_name == RESERVED_HANDLER_NAME {
            return Err(GatewayFailure::InvocationTargetMissing);
        }
        let has_session = match user_id {
            Some(uid) => self.session_manager.is_enabled(uid).await,
            None => false,
        };
        enforce(self.session_manager.config(), CallKind::Plain, handler_name, has_session)?;

        let handler = self
            .registry
            .get(handler_name)
            .ok_or(GatewayFailure::InvocationTargetMissing)?;
        let result = handler(payload.to_vec()).await;
        if let Err(err) = &result {
            warn!(handler = %handler_name, error = %err, "plain handler dispatch failed");
        }
        result
    }
}
