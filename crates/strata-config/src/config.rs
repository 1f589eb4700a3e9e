//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub world: WorldConfig,
    pub debug: DebugConfig,
}

/// World storage and simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// World directory holding the region layers and side files.
    pub directory: PathBuf,
    /// Seed recorded in `world.json` for new worlds.
    pub seed: u64,
    /// Upper bound on region files held open at once.
    pub max_open_region_files: usize,
    /// Run light propagation and persist lightmaps.
    pub lighting: bool,
    /// Radius of the loaded chunk window around the center, in chunks.
    pub view_distance: u32,
}

/// Debug/development settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter override (e.g. "debug", "info,strata_region=trace").
    pub log_level: String,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("world"),
            seed: 0,
            max_open_region_files: 32,
            lighting: true,
            view_distance: 5,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl WorldConfig {
    /// Side length of the loaded chunk window.
    pub fn window_size(&self) -> i32 {
        self.view_distance as i32 * 2 + 1
    }
}

/// Platform config directory for Strata, e.g. `~/.config/strata` on Linux.
///
/// Falls back to the working directory when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("strata"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Load / Save ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
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

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE), serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}
