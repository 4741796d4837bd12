//! Configuration system
//!
//! Serde-backed tuning structs for the physics loop. Defaults match the
//! shipped game feel; a TOML file can override any of them.

use serde::{Deserialize, Serialize};

/// Configuration trait for TOML-backed settings types
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a TOML file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents =
            toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing or malformed
    fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::info!("using default config ({}: {})", path, e);
                Self::default()
            }
        }
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
}

/// Top-level physics tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World-space height of the infinite ground plane
    pub ground_height: f32,

    /// Character controller tuning
    pub player: PlayerConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            ground_height: 0.0,
            player: PlayerConfig::default(),
        }
    }
}

impl Config for PhysicsConfig {}

/// Character controller tuning
///
/// The body is approximated by three stacked spheres; heights are the
/// local Y of each sphere center above the character origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Radius of each body sphere
    pub sphere_radius: f32,

    /// Center heights of the three body spheres, lowest first
    pub sphere_heights: [f32; 3],

    /// Downward acceleration while walking
    pub gravity: f32,

    /// Target horizontal speed on the ground
    pub walk_speed: f32,

    /// Horizontal acceleration cap while airborne
    pub air_accel: f32,

    /// Vertical takeoff speed of a jump
    pub jump_speed: f32,

    /// Target speed while flying
    pub fly_speed: f32,

    /// Spring stiffness of the flying velocity controller
    pub fly_damping: f32,

    /// Smallest ledge height worth stepping onto
    pub step_up_min: f32,

    /// Tallest ledge the controller will step onto
    pub step_up_max: f32,

    /// Minimum vertical normal component counted as standing ground
    pub ground_slope: f32,

    /// Displacement resolution substeps per update
    pub max_substeps: u32,

    /// Depenetration relaxation iteration cap
    pub relax_iterations: u32,

    /// Depenetration correction magnitude below which relaxation stops
    pub relax_epsilon: f32,

    /// Extra gather radius around each body sphere for depenetration
    pub contact_margin: f32,

    /// Decay rate of the step-up camera smoothing offset
    pub camera_decay: f32,

    /// Upper clamp on a single frame's elapsed time
    pub max_dt: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sphere_radius: 0.4,
            sphere_heights: [0.4, 1.0, 1.6],
            gravity: 20.0,
            walk_speed: 6.0,
            air_accel: 12.0,
            jump_speed: 8.0,
            fly_speed: 10.0,
            fly_damping: 8.0,
            step_up_min: 0.003,
            step_up_max: 0.25,
            ground_slope: 0.5,
            max_substeps: 5,
            relax_iterations: 100,
            relax_epsilon: 1e-4,
            contact_margin: 0.005,
            camera_decay: 20.0,
            max_dt: 0.1,
        }
    }
}

impl Config for PlayerConfig {}
