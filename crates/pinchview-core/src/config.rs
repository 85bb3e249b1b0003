//! Viewer tuning parameters.
//!
//! Every gesture, fling and compositing constant lives here with its default.
//! Hosts can override any of them from a JSON file.

use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables for the transform, gesture, fling and compositing layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Lower scale bound.
    pub min_scale: f64,
    /// Upper scale bound.
    pub max_scale: f64,
    /// Cumulative displacement (px) a pointer must travel before a drag starts.
    pub drag_threshold: f64,
    /// Multiplier applied to every drag delta.
    pub damping_factor: f64,
    /// Velocity (px/s) at which the drag boost reaches 2x.
    pub velocity_normalizer: f64,
    /// Moves faster than this (px/s) are discarded as noise.
    pub max_velocity: f64,
    /// Release velocity (px/s, per axis) required to start a fling.
    pub fling_velocity_threshold: f64,
    /// Minimum time between two fling starts.
    pub fling_cooldown_ms: u64,
    /// Length of the fling animation.
    pub fling_duration_ms: u64,
    /// Seconds of travel at release velocity covered by a fling.
    pub fling_distance_factor: f64,
    /// Fling travel cap as a fraction of the larger view dimension.
    pub fling_max_fraction: f64,
    /// Window of pointer samples used to estimate release velocity.
    pub velocity_window_ms: u64,
    /// Maximum gap between the first tap's up and the second tap's down.
    pub double_tap_timeout_ms: u64,
    /// Maximum distance between the two taps of a double tap.
    pub double_tap_slop: f64,
    /// Background fill (RGBA8) for painted frames and exports.
    pub background: [u8; 4],
    /// Busy indicator color (RGBA8).
    pub busy_indicator: [u8; 4],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 5.0,
            drag_threshold: 10.0,
            damping_factor: 0.15,
            velocity_normalizer: 12_000.0,
            max_velocity: 5_000.0,
            fling_velocity_threshold: 500.0,
            fling_cooldown_ms: 500,
            fling_duration_ms: 300,
            fling_distance_factor: 0.03,
            fling_max_fraction: 0.2,
            velocity_window_ms: 100,
            double_tap_timeout_ms: 300,
            double_tap_slop: 30.0,
            background: [250, 250, 250, 255],
            busy_indicator: [59, 130, 246, 255], // Blue
        }
    }
}

impl ViewerConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {:?}: {}", path, e)))?;
        Self::from_json(&json)
    }

    /// Load the file at [`ViewerConfig::default_path`] if there is one.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded viewer config from {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("Ignoring config at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Default config location.
    ///
    /// On Linux: `~/.config/pinchview/config.json`
    /// On Windows: `%APPDATA%\pinchview\config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pinchview").join("config.json"))
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject values the state machines cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.min_scale > 0.0) || !self.min_scale.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "min_scale must be positive, got {}",
                self.min_scale
            )));
        }
        if !(self.max_scale >= self.min_scale) || !self.max_scale.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "max_scale ({}) must be >= min_scale ({})",
                self.max_scale, self.min_scale
            )));
        }
        if self.fling_duration_ms == 0 {
            return Err(ConfigError::Invalid("fling_duration_ms must be > 0".to_string()));
        }
        if self.velocity_window_ms == 0 {
            return Err(ConfigError::Invalid("velocity_window_ms must be > 0".to_string()));
        }
        if !(self.velocity_normalizer > 0.0) {
            return Err(ConfigError::Invalid(
                "velocity_normalizer must be positive".to_string(),
            ));
        }
        if self.drag_threshold < 0.0 || self.max_velocity <= 0.0 {
            return Err(ConfigError::Invalid(
                "drag_threshold must be >= 0 and max_velocity > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Background color as a peniko color.
    pub fn background_color(&self) -> Color {
        let [r, g, b, a] = self.background;
        Color::from_rgba8(r, g, b, a)
    }

    /// Busy indicator color as a peniko color.
    pub fn busy_indicator_color(&self) -> Color {
        let [r, g, b, a] = self.busy_indicator;
        Color::from_rgba8(r, g, b, a)
    }
}
