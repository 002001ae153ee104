//! # Unified Configuration System
//!
//! All tunables of the engine live here as plain `serde` structs with
//! defaults matching the viewer's stock behavior. A complete [`EngineConfig`]
//! can be loaded from TOML or RON through the [`Config`] trait.
//!
//! ## Configuration Categories
//!
//! - **Cache**: eviction threshold and teardown grace period
//! - **Renderer**: shared surface behavior and debug features
//! - **Controls**: orbit bounds, damping and interaction policy
//! - **XR**: hit-test ray and placement damping
//! - **Scene**: framing, exposure, staging

pub use serde::{Deserialize, Serialize};

use crate::controls::InteractionPolicy;
use crate::scene::capability::RevealPolicy;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Asset cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of recently used entries kept even with zero retainers
    pub eviction_threshold: usize,
    /// Delay between a Scene's teardown and the release of its cache reference
    pub release_grace_ms: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction_threshold: 5,
            release_grace_ms: 1000.0,
        }
    }
}

/// Renderer/scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Device pixel ratio applied to Scene sizes
    pub pixel_ratio: f32,
    /// Log every render pass at debug level
    pub debug: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pixel_ratio: 1.0,
            debug: cfg!(debug_assertions),
        }
    }
}

/// Orbit controls configuration
///
/// Angles are radians, field of view is degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Lower azimuth bound
    pub min_theta: f32,
    /// Upper azimuth bound
    pub max_theta: f32,
    /// Lower polar bound
    pub min_phi: f32,
    /// Upper polar bound
    pub max_phi: f32,
    /// Lower radius bound
    pub min_radius: f32,
    /// Upper radius bound
    pub max_radius: f32,
    /// Lower field of view bound
    pub min_fov: f32,
    /// Upper field of view bound
    pub max_fov: f32,
    /// Damper decay time in milliseconds
    pub decay_ms: f64,
    /// Which raw input is accepted at all
    pub interaction_policy: InteractionPolicy,
    /// Multiplier for drag and key orbiting
    pub orbit_sensitivity: f32,
    /// Multiplier for all input
    pub input_sensitivity: f32,
    /// Ignore wheel and pinch input
    pub disable_zoom: bool,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        use crate::foundation::math::constants::PI;
        Self {
            min_theta: f32::NEG_INFINITY,
            max_theta: f32::INFINITY,
            min_phi: PI / 8.0,
            max_phi: PI - PI / 8.0,
            min_radius: 0.0,
            max_radius: f32::INFINITY,
            min_fov: 10.0,
            max_fov: 45.0,
            decay_ms: 50.0,
            interaction_policy: InteractionPolicy::AlwaysAllow,
            orbit_sensitivity: 1.0,
            input_sensitivity: 1.0,
            disable_zoom: false,
        }
    }
}

/// AR session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrConfig {
    /// Downward tilt of the screen-center hit-test ray, in degrees
    pub hit_angle_deg: f32,
    /// Damper rate multiplier while the content flies to its first placement
    pub intro_damper_rate: f64,
    /// Place content on vertical surfaces instead of floors
    pub place_on_wall: bool,
    /// Shadow intensity used while presenting
    pub shadow_intensity: f32,
    /// Place content on the first usable hit instead of waiting for a tap
    pub auto_place: bool,
    /// Let a two-finger pinch scale the placed content
    pub allow_scale: bool,
}

impl Default for XrConfig {
    fn default() -> Self {
        Self {
            hit_angle_deg: 20.0,
            intro_damper_rate: 0.4,
            place_on_wall: false,
            shadow_intensity: 0.3,
            auto_place: true,
            allow_scale: true,
        }
    }
}

/// Per-Scene defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Vertical field of view the content is framed for, in degrees
    pub framed_fov_deg: f32,
    /// Tone mapping exposure
    pub exposure: f32,
    /// Shadow intensity
    pub shadow_intensity: f32,
    /// When the poster is dismissed
    pub reveal: RevealPolicy,
    /// Turntable rotation when idle
    pub auto_rotate: bool,
    /// Idle time after user interaction before auto-rotate resumes
    pub auto_rotate_delay_ms: f64,
    /// Turntable speed in radians per second
    pub rotation_per_second: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            framed_fov_deg: 45.0,
            exposure: 1.0,
            shadow_intensity: 0.0,
            reveal: RevealPolicy::Auto,
            auto_rotate: false,
            auto_rotate_delay_ms: 3000.0,
            rotation_per_second: std::f32::consts::PI / 32.0,
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Asset cache configuration
    pub cache: CacheConfig,
    /// Renderer configuration
    pub renderer: RendererConfig,
    /// Controls configuration applied to new Scenes
    pub controls: ControlsConfig,
    /// AR session configuration
    pub xr: XrConfig,
    /// Scene defaults
    pub scene: SceneConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache: CacheConfig::default(),
            renderer: RendererConfig::default(),
            controls: ControlsConfig::default(),
            xr: XrConfig::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the controls configuration
    pub fn with_controls(mut self, controls: ControlsConfig) -> Self {
        self.controls = controls;
        self
    }
}

impl Config for EngineConfig {}
