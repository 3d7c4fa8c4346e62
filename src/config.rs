//! Match configuration.
//!
//! Values are stored in human units (metres, ratios, milliseconds) and
//! converted to Q16.16 once, when a match is built, so a config file never
//! carries raw fixed-point numbers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::fixed::{to_fixed, Fixed};
use crate::game::camera::CameraSettings;
use crate::game::possession::PossessionParams;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "PITCH_MATCH_CONFIG";

/// Errors raised while loading or validating a config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was tried
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// File was not valid JSON for `MatchConfig`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Broadcast camera settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Focus points averaged by the follower
    pub history_len: usize,
    /// Age of the mental image the camera looks at (ms)
    pub lag_ms: u64,
    /// Blend toward the desired pose per tick (0..=1)
    pub blend: f64,
    /// Field of view at zoom 1.0 (degrees)
    pub base_fov: f64,
    /// Distance behind the focus at zoom 1.0 (m)
    pub distance: f64,
    /// Height at zoom 1.0 (m)
    pub height: f64,
    /// Initial zoom
    pub zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            history_len: 20,
            lag_ms: 100,
            blend: 0.1,
            base_fov: 40.0,
            distance: 40.0,
            height: 20.0,
            zoom: 1.0,
        }
    }
}

impl CameraConfig {
    /// Fixed-point settings for the follower.
    pub fn settings(&self) -> CameraSettings {
        CameraSettings {
            history_len: self.history_len,
            lag_ms: self.lag_ms,
            blend: to_fixed(self.blend),
            base_fov: to_fixed(self.base_fov),
            distance: to_fixed(self.distance),
            height: to_fixed(self.height),
        }
    }
}

/// Tuning for a single match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Mental images retained (one per 10 ms)
    pub history_capacity: usize,
    /// Possession-side samples retained (one per tick)
    pub possession_history_len: usize,
    /// Match clock speed relative to simulated time
    pub match_duration_factor: f64,
    /// Minimum gap between two registered body-ball contacts (ms)
    pub body_ball_throttle_ms: u64,
    /// Goal celebration length (ms)
    pub goal_celebration_ms: u64,
    /// Decay of the last-touch bias used for possession (ms)
    pub touch_bias_decay_ms: u64,
    /// Distance within which players claim possession (m)
    pub possession_range: f64,
    /// Length of the replay requested after a goal (ms)
    pub short_replay_ms: u64,
    /// Ball prediction length, in ticks
    pub prediction_steps: usize,
    /// Designated player drifts toward a loose ball when idle
    pub use_magnet: bool,
    /// Overrides the setup seed for environment randomisation
    pub environment_seed: Option<u64>,
    /// Camera follower
    pub camera: CameraConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            possession_history_len: 500,
            match_duration_factor: 1.0,
            body_ball_throttle_ms: 150,
            goal_celebration_ms: 4000,
            touch_bias_decay_ms: 2000,
            possession_range: 10.0,
            short_replay_ms: 5000,
            prediction_steps: 100,
            use_magnet: false,
            environment_seed: None,
            camera: CameraConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Load from the file named by `PITCH_MATCH_CONFIG`, or use defaults.
    pub fn load_or_default() -> Self {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::from_file(&path) {
            Ok(config) => {
                tracing::debug!("Loaded match config from {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("{}, using default match config", e);
                Self::default()
            }
        }
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid { field: "history_capacity", reason: "must be at least 1" });
        }
        if self.possession_history_len == 0 {
            return Err(ConfigError::Invalid { field: "possession_history_len", reason: "must be at least 1" });
        }
        if !(self.match_duration_factor > 0.0 && self.match_duration_factor <= 1000.0) {
            return Err(ConfigError::Invalid { field: "match_duration_factor", reason: "must be in (0, 1000]" });
        }
        if !(self.possession_range > 0.0 && self.possession_range <= 200.0) {
            return Err(ConfigError::Invalid { field: "possession_range", reason: "must be in (0, 200]" });
        }
        if self.camera.history_len == 0 {
            return Err(ConfigError::Invalid { field: "camera.history_len", reason: "must be at least 1" });
        }
        if !(self.camera.blend > 0.0 && self.camera.blend <= 1.0) {
            return Err(ConfigError::Invalid { field: "camera.blend", reason: "must be in (0, 1]" });
        }
        if !(self.camera.base_fov > 0.0 && self.camera.base_fov < 180.0) {
            return Err(ConfigError::Invalid { field: "camera.base_fov", reason: "must be in (0, 180)" });
        }
        if !(self.camera.zoom > 0.0) {
            return Err(ConfigError::Invalid { field: "camera.zoom", reason: "must be positive" });
        }
        Ok(())
    }

    /// Match clock multiplier in Q16.16.
    pub fn duration_factor(&self) -> Fixed {
        to_fixed(self.match_duration_factor)
    }

    /// Possession update parameters in Q16.16.
    pub fn possession_params(&self) -> PossessionParams {
        PossessionParams {
            range: to_fixed(self.possession_range),
            touch_bias_decay_ms: self.touch_bias_decay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::FIXED_ONE;

    #[test]
    fn test_default_config_is_valid() {
        let config = MatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity, 1000);
        assert_eq!(config.duration_factor(), FIXED_ONE);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MatchConfig::from_json_str(
            r#"{ "match_duration_factor": 18.0, "camera": { "lag_ms": 250 } }"#,
        )
        .unwrap();
        assert_eq!(config.duration_factor(), 18 * FIXED_ONE);
        assert_eq!(config.camera.lag_ms, 250);
        assert_eq!(config.camera.history_len, 20);
        assert_eq!(config.goal_celebration_ms, 4000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MatchConfig::from_json_str(r#"{ "history_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "history_capacity", .. }));

        let err = MatchConfig::from_json_str(r#"{ "camera": { "blend": 1.5 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "camera.blend", .. }));

        let err = MatchConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = MatchConfig::from_file("/nonexistent/pitch-match.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_or_default() {
        let config = MatchConfig::load_or_default();
        assert!(config.validate().is_ok());
    }
}
