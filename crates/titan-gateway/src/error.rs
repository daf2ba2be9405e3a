use thiserror::Error;

/// Gateway- and enforcement-level failures (spec §7's taxonomy, the entries
/// that are specific to invocation dispatch rather than the session itself).
#[derive(Debug, Error)]
pub enum GatewayFailure {
    #[error("no authenticated user on this call")]
    AuthRequired,
    #[error("security failure: {0}")]
    SecurityFailure(#[from] titan_session::SessionFailure),
    #[error("no handler registered for this target")]
    InvocationTargetMissing,
    #[error("wrapped payload did not match the handler's argument list")]
    ArgumentDecodeFailure,
    #[error("encryption is required but no session exists")]
    EncryptionRequired,
    #[error("encryption is required; call the encrypted gateway instead")]
    UseEncryptedGateway,
    #[error("handler returned an error: {0}")]
    HandlerFailed(String),
}
