//! Server configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Runtime settings for the chat server
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Listener address
    pub bind_addr: String,
    /// Room every session joins on connect
    pub default_room: String,
    /// Outbound queue size per session
    pub outbound_capacity: usize,
    /// Per-recipient enqueue deadline for broadcasts, in milliseconds
    pub send_timeout_ms: u64,
    /// Longest accepted inbound line, in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9999".to_string(),
            default_room: "lobby".to_string(),
            outbound_capacity: 100,
            send_timeout_ms: 1000,
            max_line_length: 4096,
        }
    }
}

impl ServerConfig {
    /// Parse and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Invalid("outbound_capacity must be at least 1"));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid("send_timeout_ms must be at least 1"));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid("max_line_length must be at least 1"));
        }
        if self.default_room.is_empty() || self.default_room.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "default_room must be a single non-empty word",
            ));
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.default_room, "lobby");
        assert_eq!(config.outbound_capacity, 100);
        assert_eq!(config.send_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ServerConfig::from_json(r#"{"bind_addr": "0.0.0.0:7000"}"#).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:7000");
        assert_eq!(config.default_room, "lobby");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::from_json(r#"{"outbound_capacity": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json(r#"{"default_room": "two words"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json(r#"{"unknown": 1}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_without_path() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9999");
    }

    #[test]
    fn test_load_missing_file() {
        let err = ServerConfig::load(Some(Path::new("/nonexistent/room_chat.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }
}
