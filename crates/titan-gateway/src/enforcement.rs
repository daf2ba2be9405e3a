//! Policy for when an invocation is allowed to bypass the encrypted gateway.
//!
//! Implements the exact decision table: encryption disabled lets everything
//! through; encryption enabled-but-optional lets unencrypted calls through
//! too (clients without a session can still operate); encryption required
//! demands either a session-bearing encrypted call or membership in the
//! meta-handler allow-list (handshake, rotation ack, and the like, which
//! necessarily run before a session exists).

use titan_config::TitanConfig;

use crate::error::GatewayFailure;
use crate::registry::RESERVED_HANDLER_NAME;

/// The shape of the call under consideration: did it arrive wrapped inside
/// the reserved encrypted-invocation handler, or as a bare unencrypted call
/// against some other named handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Encrypted,
    Plain,
}

/// Handler names that may be called unencrypted even under `required`
/// enforcement, because they exist to establish or repair the very session
/// encryption depends on.
pub const ENFORCEMENT_EXEMPT_HANDLERS: &[&str] = &["handshake", "rotation_ack", "get_config"];

fn is_exempt(handler_name: &str) -> bool {
    ENFORCEMENT_EXEMPT_HANDLERS.contains(&handler_name)
}

/// Decide whether a call described by `kind`/`handler_name`, from a caller
/// with `has_session`, is allowed under `config`'s enforcement policy.
pub fn enforce(
    config: &TitanConfig,
    kind: CallKind,
    handler_name: &str,
    has_session: bool,
) -> Result<(), GatewayFailure> {
    debug_assert_ne!(handler_name, RESERVED_HANDLER_NAME);

    if !config.enabled {
        return Ok(());
    }
    if is_exempt(handler_name) {
        return Ok(());
    }
    if !config.required {
        return Ok(());
    }

    match (kind, has_session) {
        (CallKind::Encrypted, true) => Ok(()),
        (CallKind::Encrypted, false) => Err(GatewayFailure::EncryptionRequired),
        (CallKind::Plain, true) => Err(GatewayFailure::UseEncryptedGateway),
        (CallKind::Plain, false) => Err(GatewayFailure::EncryptionRequired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, required: bool) -> TitanConfig {
        let mut c = TitanConfig::default();
        c.enabled = enabled;
        c.required = required;
        c
    }

    #[test]
    fn disabled_allows_everything() {
        let c = config(false, false);
        assert!(enforce(&c, CallKind::Plain, "anything", false).is_ok());
    }

    #[test]
    fn optional_allows_plain_calls_without_a_session() {
        let c = config(true, false);
        assert!(enforce(&c, CallKind::Plain, "move_player", false).is_ok());
    }

    #[test]
    fn required_rejects_plain_call_with_session() {
        let c = config(true, true);
        let result = enforce(&c, CallKind::Plain, "move_player", true);
        assert!(matches!(result, Err(GatewayFailure::UseEncryptedGateway)));
    }

    #[test]
    fn required_rejects_encrypted_call_without_session() {
        let c = config(true, true);
        let result = enforce(&c, CallKind::Encrypted, "move_player", false);
        assert!(matches!(result, Err(GatewayFailure::EncryptionRequired)));
    }

    #[test]
    fn required_allows_exempt_handshake_handler() {
        let c = config(true, true);
        assert!(enforce(&c, CallKind::Plain, "handshake", false).is_ok());
    }

    #[test]
    fn required_allows_encrypted_call_with_session() {
        let c = config(true, true);
        assert!(enforce(&c, CallKind::Encrypted, "move_player", true).is_ok());
    }
}
