use thiserror::Error;

/// Security and lifecycle failures surfaced by the session manager.
///
/// All variants except `Crypto` correspond 1:1 to the error taxonomy kinds
/// documented for the core: security failures are always surfaced to the
/// caller and never recovered locally. `PersistenceFailure` deliberately has
/// no variant here — a store write failure is logged and metered, the
/// accompanying crypto operation still succeeds.
#[derive(Debug, Error)]
pub enum SessionFailure {
    #[error("no authenticated user on this call")]
    AuthRequired,
    #[error("user has no session")]
    NoSession,
    #[error("envelope key_id matches neither current nor previous key")]
    UnknownKey,
    #[error("envelope key_id matched the previous key, but its grace period has expired")]
    PreviousKeyExpired,
    #[error("envelope timestamp outside the accepted replay window")]
    TimestampOutOfWindow,
    #[error("envelope sequence number is not strictly greater than the last accepted one")]
    SequenceRegression,
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("AEAD tag verification failed")]
    InvalidTag,
    #[error("no rotation is pending for this user")]
    NoPendingRotation,
    #[error(transparent)]
    Crypto(#[from] titan_crypto::CryptoFailure),
}
