//! Connection configuration.

use super::assembler::DEFAULT_MAX_MESSAGE_SIZE;
use super::frame::{DEFAULT_MAX_FRAME_SIZE, MAX_CONTROL_PAYLOAD, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// What a connection does with a rejected frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Fail the connection: send CLOSE with the violation's status code.
    #[default]
    Strict,
    /// Drop the offending frame, log it, and stay open.
    Lenient,
}

/// Invalid configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has a value outside its valid range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Config file could not be read.
    #[cfg(feature = "config-file")]
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema.
    #[cfg(feature = "config-file")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// WebSocket connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Endpoint role; decides the masking rule in both directions.
    pub role: Role,
    /// Rejection policy for protocol violations.
    pub policy: RejectionPolicy,
    /// Maximum payload of a single frame.
    pub max_frame_size: usize,
    /// Maximum size of a reassembled message.
    pub max_message_size: usize,
    /// Fail TEXT messages that are not UTF-8. Close reasons are always
    /// validated.
    pub validate_utf8: bool,
    /// Answer PING with PONG automatically.
    pub auto_pong: bool,
    /// How long to wait for the peer's CLOSE after sending ours.
    #[serde(with = "duration_ms", rename = "close_timeout_ms")]
    pub close_timeout: Duration,
    /// Split outbound messages into fragments of at most this many bytes.
    pub fragment_size: Option<usize>,
    /// Bytes requested from the transport per read.
    pub read_buffer_size: usize,
    /// Reserved bits defined by a negotiated extension (`RSV1 RSV2 RSV3`).
    pub negotiated_rsv_bits: u8,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            role: Role::Server,
            policy: RejectionPolicy::Strict,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            validate_utf8: true,
            auto_pong: true,
            close_timeout: Duration::from_secs(5),
            fragment_size: None,
            read_buffer_size: 8 * 1024,
            negotiated_rsv_bits: 0,
        }
    }
}

impl WebSocketConfig {
    /// Defaults for the connecting side.
    #[must_use]
    pub fn client() -> Self {
        Self {
            role: Role::Client,
            ..Self::default()
        }
    }

    /// Defaults for the accepting side.
    #[must_use]
    pub fn server() -> Self {
        Self::default()
    }

    /// Set the rejection policy.
    #[must_use]
    pub fn policy(mut self, policy: RejectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shorthand for [`RejectionPolicy::Lenient`].
    #[must_use]
    pub fn lenient(self) -> Self {
        self.policy(RejectionPolicy::Lenient)
    }

    /// Set the maximum frame payload.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the maximum message size.
    #[must_use]
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Enable or disable UTF-8 validation of TEXT messages.
    #[must_use]
    pub fn validate_utf8(mut self, enabled: bool) -> Self {
        self.validate_utf8 = enabled;
        self
    }

    /// Enable or disable automatic PONG replies.
    #[must_use]
    pub fn auto_pong(mut self, enabled: bool) -> Self {
        self.auto_pong = enabled;
        self
    }

    /// Set the close handshake timeout.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Fragment outbound messages larger than `size`.
    #[must_use]
    pub fn fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = Some(size);
        self
    }

    /// Set the transport read chunk size.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Accept reserved bits defined by a negotiated extension.
    #[must_use]
    pub fn negotiated_rsv_bits(mut self, bits: u8) -> Self {
        self.negotiated_rsv_bits = bits;
        self
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size < MAX_CONTROL_PAYLOAD {
            return Err(ConfigError::invalid(
                "max_frame_size",
                format!("must be at least {MAX_CONTROL_PAYLOAD}"),
            ));
        }
        if self.max_message_size < self.max_frame_size {
            return Err(ConfigError::invalid(
                "max_message_size",
                "must be at least max_frame_size",
            ));
        }
        if self.fragment_size == Some(0) {
            return Err(ConfigError::invalid("fragment_size", "must be non-zero"));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::invalid("read_buffer_size", "must be non-zero"));
        }
        if self.negotiated_rsv_bits > 0b111 {
            return Err(ConfigError::invalid(
                "negotiated_rsv_bits",
                "only the three RSV bits may be set",
            ));
        }
        if self.close_timeout.is_zero() {
            return Err(ConfigError::invalid("close_timeout", "must be non-zero"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
