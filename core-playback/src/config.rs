//! # Loop Configuration
//!
//! Tuning knobs for the loop rotator.

use crate::error::{PlaybackError, Result};
use bridge_traits::media::Volume;
use serde::{Deserialize, Serialize};

/// Loop rotator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Gain applied to both channels until the host calls `set_volume`.
    ///
    /// Default: 1.0 (unity).
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Capacity of the host command channel.
    ///
    /// Default: 32.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// How many back-to-back attempts are made to create a standby handle
    /// before the rotator gives up until the next boundary.
    ///
    /// Default: 3.
    #[serde(default = "default_standby_create_attempts")]
    pub standby_create_attempts: u32,

    /// Release both handles when every rotator handle is dropped without an
    /// explicit `release()`.
    ///
    /// Default: true.
    #[serde(default = "default_release_on_drop")]
    pub release_on_drop: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            initial_volume: default_initial_volume(),
            command_buffer: default_command_buffer(),
            standby_create_attempts: default_standby_create_attempts(),
            release_on_drop: default_release_on_drop(),
        }
    }
}

impl LoopConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LoopConfig = serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Same configuration with a different starting gain.
    pub fn with_initial_volume(mut self, gain: f32) -> Self {
        self.initial_volume = gain;
        self
    }

    pub fn initial_volume(&self) -> Volume {
        Volume::uniform(self.initial_volume)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.initial_volume().is_valid() {
            return Err(PlaybackError::InvalidConfig(
                "initial_volume must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.command_buffer == 0 {
            return Err(PlaybackError::InvalidConfig(
                "command_buffer must be > 0".to_string(),
            ));
        }

        if self.standby_create_attempts == 0 {
            return Err(PlaybackError::InvalidConfig(
                "standby_create_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_initial_volume() -> f32 {
    1.0
}

fn default_command_buffer() -> usize {
    32
}

fn default_standby_create_attempts() -> u32 {
    3
}

fn default_release_on_drop() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LoopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_volume(), Volume::UNITY);
        assert_eq!(config.standby_create_attempts, 3);
        assert!(config.release_on_drop);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let config = LoopConfig {
            initial_volume: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            command_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LoopConfig {
            standby_create_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_json_fills_defaults() {
        let config = LoopConfig::from_json(r#"{ "initial_volume": 0.25 }"#).unwrap();
        assert_eq!(config.initial_volume, 0.25);
        assert_eq!(config.command_buffer, 32);

        assert!(matches!(
            LoopConfig::from_json(r#"{ "standby_create_attempts": 0 }"#),
            Err(PlaybackError::InvalidConfig(_))
        ));
        assert!(LoopConfig::from_json("not json").is_err());
    }

    #[test]
    fn with_initial_volume_overrides_gain() {
        let config = LoopConfig::default().with_initial_volume(0.4);
        assert_eq!(config.initial_volume(), Volume::uniform(0.4));
    }
}
