//! # Runtime Configuration
//!
//! Tunables for one [`crate::Pal`] instance, loaded from JSON.
//!
//! Every field has a default, so a config file only names what it changes:
//!
//! ```
//! use pal::PalConfig;
//!
//! let config = PalConfig::from_json(r#"{ "default_scale": 2 }"#).unwrap();
//! assert_eq!(config.default_scale, 2);
//! assert_eq!(config.table_capacity, 1000);
//! ```

use std::fs;
use std::path::Path;

use core_types::Cap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest supported event ring: 16 MiB
pub const MAX_QUEUE_POW2: u32 = 24;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Platform layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PalConfig {
    /// Capability table slots
    pub table_capacity: usize,

    /// Handles below this are well-known devices
    pub reserved_handles: u32,

    /// Integer display scale when the host imposes none
    pub default_scale: u32,

    /// Rotating buffers in double-buffer mode
    pub framebuffer_buffers: usize,

    /// Floor for event ring sizes, as a power of two
    pub min_queue_pow2: u32,

    /// Push-mode audio backlog limit in bytes (`None` = unbounded)
    pub audio_high_water_bytes: Option<usize>,

    /// Millisecond delta carried by Frame and Sync events
    pub frame_dt_ms: u32,

    /// Log level name for the daemon
    pub log_level: String,
}

impl Default for PalConfig {
    fn default() -> Self {
        Self {
            table_capacity: 1000,
            reserved_handles: 100,
            default_scale: 3,
            framebuffer_buffers: 2,
            min_queue_pow2: 12,
            audio_high_water_bytes: None,
            frame_dt_ms: 1,
            log_level: "info".to_string(),
        }
    }
}

impl PalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self
    }

    pub fn with_reserved_handles(mut self, reserved: u32) -> Self {
        self.reserved_handles = reserved;
        self
    }

    pub fn with_default_scale(mut self, scale: u32) -> Self {
        self.default_scale = scale;
        self
    }

    pub fn with_framebuffer_buffers(mut self, buffers: usize) -> Self {
        self.framebuffer_buffers = buffers;
        self
    }

    pub fn with_audio_high_water(mut self, bytes: usize) -> Self {
        self.audio_high_water_bytes = Some(bytes);
        self
    }

    /// Serializes to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses and validates a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reserved_handles as usize >= self.table_capacity {
            return Err(ConfigError::Invalid(format!(
                "reserved_handles ({}) must be below table_capacity ({})",
                self.reserved_handles, self.table_capacity
            )));
        }
        if self.reserved_handles <= Cap::STORAGE.raw() {
            return Err(ConfigError::Invalid(format!(
                "reserved_handles ({}) must leave room for the well-known devices",
                self.reserved_handles
            )));
        }
        if self.framebuffer_buffers < 2 {
            return Err(ConfigError::Invalid(
                "framebuffer_buffers must be at least 2".to_string(),
            ));
        }
        if self.default_scale == 0 {
            return Err(ConfigError::Invalid("default_scale must be at least 1".to_string()));
        }
        if self.min_queue_pow2 > MAX_QUEUE_POW2 {
            return Err(ConfigError::Invalid(format!(
                "min_queue_pow2 ({}) exceeds {}",
                self.min_queue_pow2, MAX_QUEUE_POW2
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reserved_handles, 100);
        assert_eq!(config.default_scale, 3);
        assert_eq!(config.min_queue_pow2, 12);
        assert_eq!(config.audio_high_water_bytes, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            PalConfig::from_json(r#"{ "frame_dt_ms": 16, "audio_high_water_bytes": 8192 }"#)
                .unwrap();
        assert_eq!(config.frame_dt_ms, 16);
        assert_eq!(config.audio_high_water_bytes, Some(8192));
        assert_eq!(config.framebuffer_buffers, 2);
    }

    #[test]
    fn test_json_round_trip() {
        let config = PalConfig::new().with_default_scale(2).with_audio_high_water(4096);
        let json = config.to_json().unwrap();
        assert_eq!(PalConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_configs() {
        let bad = [
            PalConfig::new().with_reserved_handles(1000),
            PalConfig::new().with_reserved_handles(3),
            PalConfig::new().with_framebuffer_buffers(1),
            PalConfig::new().with_default_scale(0),
            PalConfig {
                min_queue_pow2: 30,
                ..PalConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            PalConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "table_capacity": 64, "reserved_handles": 16 }}"#).unwrap();
        let config = PalConfig::load(file.path()).unwrap();
        assert_eq!(config.table_capacity, 64);
        assert_eq!(config.reserved_handles, 16);

        assert!(matches!(
            PalConfig::load("/nonexistent/pal.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
