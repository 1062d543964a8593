//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Mesh refinement budget.
    pub roam: RoamConfig,
    /// Camera and viewport.
    pub view: ViewConfig,
    /// Procedural terrain.
    pub terrain: TerrainConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Split/merge budget for the refinement driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoamConfig {
    /// Polygon count to steer toward.
    pub target_polys: usize,
    /// Maximum split/merge steps per frame.
    pub max_iterations: usize,
    /// Distance from the target tolerated before bulk fill or drain.
    pub slack: usize,
    /// Error multiplier for triangles on the silhouette.
    pub silhouette_bias: f64,
}

/// Camera and viewport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Vertical field of view in degrees.
    pub fov_deg: f64,
    /// Near clip distance in meters.
    pub near_m: f64,
    /// Far clip distance in meters.
    pub far_m: f64,
    /// Camera altitude above the surface in meters.
    pub orbit_altitude_m: f64,
    /// Longitude the camera advances each frame.
    pub orbit_degrees_per_frame: f64,
}

/// fBm terrain configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Attach a height function to the globe.
    pub enabled: bool,
    /// Noise seed.
    pub seed: u32,
    /// Peak displacement in meters.
    pub amplitude_m: f64,
    /// Base noise frequency, in cycles per Earth radius.
    pub frequency: f64,
    /// Number of noise octaves.
    pub octaves: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Run the full mesh consistency check after every frame.
    pub validate_every_frame: bool,
}

impl Default for RoamConfig {
    fn default() -> Self {
        Self {
            target_polys: 2000,
            max_iterations: 500,
            slack: 100,
            silhouette_bias: 500.0,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fov_deg: 60.0,
            near_m: 1_000.0,
            far_m: 100_000_000.0,
            orbit_altitude_m: 2_000_000.0,
            orbit_degrees_per_frame: 0.5,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: 42,
            amplitude_m: 8_000.0,
            frequency: 4.0,
            octaves: 6,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            validate_every_frame: false,
        }
    }
}

/// Platform config directory for Orbis, or the working directory when the
/// platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("orbis"))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Reject values the mesh driver or camera cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };
        if self.roam.max_iterations == 0 {
            return invalid("roam.max_iterations", "must be at least 1");
        }
        if !(self.roam.silhouette_bias > 0.0) {
            return invalid("roam.silhouette_bias", "must be positive");
        }
        if self.view.width == 0 || self.view.height == 0 {
            return invalid("view.width/height", "viewport must not be empty");
        }
        if !(self.view.fov_deg > 0.0 && self.view.fov_deg < 180.0) {
            return invalid("view.fov_deg", "must be between 0 and 180");
        }
        if !(self.view.near_m > 0.0 && self.view.near_m < self.view.far_m) {
            return invalid("view.near_m", "must be positive and below far_m");
        }
        if !(self.view.orbit_altitude_m > 0.0) {
            return invalid("view.orbit_altitude_m", "must be above the surface");
        }
        if self.terrain.enabled && self.terrain.octaves == 0 {
            return invalid("terrain.octaves", "must be at least 1");
        }
        Ok(())
    }
}
