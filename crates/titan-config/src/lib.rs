//! Shared configuration for every crate in the encryption core.
//!
//! `TitanConfig` mirrors the enumerated configuration surface, loaded from
//! a TOML file (`TitanConfig::load_from_path`) or constructed directly for
//! embedding in a host process that already owns its own config story.

pub mod error;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_rotation_interval_minutes() -> u32 {
    60
}

fn default_max_messages_per_key() -> u64 {
    1_000_000
}

fn default_grace_period_seconds() -> u32 {
    300
}

fn default_replay_window_seconds() -> u32 {
    60
}

fn default_clock_skew_seconds() -> u32 {
    5
}

fn default_broadcast_max_concurrency() -> u32 {
    32
}

fn default_session_persistence_ttl_seconds() -> u32 {
    86_400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitanConfig {
    /// Master switch; plaintext calls pass through when false.
    pub enabled: bool,
    /// Strict enforcement: non-gateway calls are rejected once a session exists.
    pub required: bool,
    pub rotation_interval_minutes: u32,
    pub max_messages_per_key: u64,
    pub key_rotation_grace_period_seconds: u32,
    pub replay_window_seconds: u32,
    pub clock_skew_seconds: u32,
    pub broadcast_max_concurrency: u32,
    pub session_persistence_ttl_seconds: u32,
}

impl Default for TitanConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            required: default_false(),
            rotation_interval_minutes: default_rotation_interval_minutes(),
            max_messages_per_key: default_max_messages_per_key(),
            key_rotation_grace_period_seconds: default_grace_period_seconds(),
            replay_window_seconds: default_replay_window_seconds(),
            clock_skew_seconds: default_clock_skew_seconds(),
            broadcast_max_concurrency: default_broadcast_max_concurrency(),
            session_persistence_ttl_seconds: default_session_persistence_ttl_seconds(),
        }
    }
}

impl TitanConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replay_window_seconds == 0 {
            return Err(ConfigError::Invalid(
                "replay_window_seconds must be non-zero".into(),
            ));
        }
        if self.rotation_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "rotation_interval_minutes must be non-zero".into(),
            ));
        }
        if self.max_messages_per_key == 0 {
            return Err(ConfigError::Invalid(
                "max_messages_per_key must be non-zero".into(),
            ));
        }
        if self.broadcast_max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "broadcast_max_concurrency must be non-zero".into(),
            ));
        }
        if self.required && !self.enabled {
            return Err(ConfigError::Invalid(
                "required cannot be true while enabled is false".into(),
            ));
        }
        Ok(())
    }

    /// Policy advertisement returned by the unauthenticated `get_config` handler.
    pub fn policy_advertisement(&self) -> (bool, bool) {
        (self.enabled, self.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = TitanConfig::default();
        assert!(cfg.enabled);
        assert!(!cfg.required);
        assert_eq!(cfg.rotation_interval_minutes, 60);
        assert_eq!(cfg.max_messages_per_key, 1_000_000);
        assert_eq!(cfg.key_rotation_grace_period_seconds, 300);
        assert_eq!(cfg.replay_window_seconds, 60);
        assert_eq!(cfg.clock_skew_seconds, 5);
        assert_eq!(cfg.broadcast_max_concurrency, 32);
        assert_eq!(cfg.session_persistence_ttl_seconds, 86_400);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_required_without_enabled() {
        let cfg = TitanConfig {
            enabled: false,
            required: true,
            ..TitanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let cfg = TitanConfig::from_toml_str("required = true\n").unwrap();
        assert!(cfg.enabled);
        assert!(cfg.required);
        assert_eq!(cfg.rotation_interval_minutes, 60);
    }

    #[test]
    fn rejects_zero_replay_window() {
        let cfg = TitanConfig {
            replay_window_seconds: 0,
            ..TitanConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
