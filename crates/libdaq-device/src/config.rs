use std::path::Path;
use std::time::Duration;

use libdaq_frame::{command::MAX_KNOWN_PAYLOAD_LEN, CodecConfig, FRAME_OVERHEAD, MAX_PACKET_SIZE};
use serde::{Deserialize, Serialize};

/// Errors loading or validating a [`DeviceConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema.
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Timing and sizing knobs for one device session.
///
/// Durations are (de)serialized as integer milliseconds with an `_ms` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Bound on waiting for a command acknowledgement.
    #[serde(rename = "ack_timeout_ms", with = "millis")]
    pub ack_timeout: Duration,
    /// Bound on a single receive while acquiring.
    #[serde(rename = "receive_timeout_ms", with = "millis")]
    pub receive_timeout: Duration,
    /// Consecutive receive timeouts tolerated before the device is declared
    /// unresponsive.
    pub max_consecutive_timeouts: u32,
    /// Largest frame the device accepts, overhead included.
    pub max_packet_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(500),
            receive_timeout: Duration::from_millis(1000),
            max_consecutive_timeouts: 5,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl DeviceConfig {
    /// Load and validate a JSON config file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout.is_zero() {
            return Err(ConfigError::Invalid("ack_timeout_ms must be > 0".into()));
        }
        if self.receive_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "receive_timeout_ms must be > 0".into(),
            ));
        }
        if self.max_consecutive_timeouts == 0 {
            return Err(ConfigError::Invalid(
                "max_consecutive_timeouts must be >= 1".into(),
            ));
        }
        let min_packet = FRAME_OVERHEAD + MAX_KNOWN_PAYLOAD_LEN;
        if self.max_packet_size < min_packet {
            return Err(ConfigError::Invalid(format!(
                "max_packet_size must be >= {min_packet}"
            )));
        }
        Ok(())
    }

    /// Codec settings derived from this config.
    pub fn codec(&self) -> CodecConfig {
        CodecConfig {
            max_packet_size: self.max_packet_size,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DeviceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.codec().max_packet_size, MAX_PACKET_SIZE);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = DeviceConfig::from_json_str(r#"{ "receive_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.receive_timeout, Duration::from_millis(250));
        assert_eq!(config.ack_timeout, DeviceConfig::default().ack_timeout);
    }

    #[test]
    fn json_roundtrip_uses_millisecond_fields() {
        let config = DeviceConfig {
            ack_timeout: Duration::from_millis(42),
            ..DeviceConfig::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["ack_timeout_ms"], 42);
        let back: DeviceConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            DeviceConfig::from_json_str(r#"{ "timeout": 1 }"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            DeviceConfig::from_json_str(r#"{ "max_consecutive_timeouts": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DeviceConfig::from_json_str(r#"{ "max_packet_size": 16 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DeviceConfig::from_json_str(r#"{ "receive_timeout_ms": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn reads_config_file() {
        let path = std::env::temp_dir().join(format!(
            "libdaq-config-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::write(&path, r#"{ "ack_timeout_ms": 75 }"#).unwrap();
        let config = DeviceConfig::from_json_file(&path).unwrap();
        assert_eq!(config.ack_timeout, Duration::from_millis(75));
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            DeviceConfig::from_json_file(&path),
            Err(ConfigError::Read { .. })
        ));
    }
}
