//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use noaworld::{ChunkBounds, SerializeMode, WorldBaker, WorldBakerBuilder, WorldLoader};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the persisted config inside the config directory.
pub const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Baking settings.
    pub bake: BakeConfig,
    /// Loading settings.
    pub loader: LoaderConfig,
    /// Demo terrain generator settings.
    pub terrain: TerrainConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Baking configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BakeConfig {
    /// Chunk edge length in voxels (1..=512).
    pub chunk_size: u32,
    /// Inclusive lower chunk corner `(x, y, z)`.
    pub bounds_min: (i16, i16, i16),
    /// Inclusive upper chunk corner `(x, y, z)`.
    pub bounds_max: (i16, i16, i16),
    /// Pack on a background worker thread.
    pub use_worker: bool,
    /// Yield the thread every N generated chunks.
    pub yield_interval: usize,
    /// Report progress every N generated chunks.
    pub progress_interval: usize,
}

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum number of cached chunk arrays.
    pub cache_capacity: usize,
    /// Drop the raw container right after loading.
    pub release_after_load: bool,
}

/// Heightmap terrain used by the demo generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Noise seed.
    pub seed: u32,
    /// World Y of the mean surface, in voxels.
    pub base_height: f64,
    /// Peak deviation from `base_height`, in voxels.
    pub amplitude: f64,
    /// Horizontal noise frequency (per voxel).
    pub frequency: f64,
    /// fBm octaves.
    pub octaves: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to the config directory in debug builds.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 32,
            bounds_min: (-4, -2, -4),
            bounds_max: (3, 1, 3),
            use_worker: true,
            yield_interval: noaworld::baker::DEFAULT_YIELD_INTERVAL,
            progress_interval: noaworld::baker::DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: noaworld::DEFAULT_CACHE_CAPACITY,
            release_after_load: false,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            base_height: 0.0,
            amplitude: 24.0,
            frequency: 0.01,
            octaves: 4,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: true,
        }
    }
}

// --- Mapping onto the library types ---

impl BakeConfig {
    /// Configured chunk bounds.
    pub fn bounds(&self) -> ChunkBounds {
        let (x0, y0, z0) = self.bounds_min;
        let (x1, y1, z1) = self.bounds_max;
        ChunkBounds::new((x0, x1), (y0, y1), (z0, z1))
    }

    /// Where the baker packs the container.
    pub fn serialize_mode(&self) -> SerializeMode {
        if self.use_worker {
            SerializeMode::Worker
        } else {
            SerializeMode::Inline
        }
    }

    /// A baker builder with every setting except the generator applied.
    pub fn baker_builder(&self) -> WorldBakerBuilder {
        WorldBaker::builder()
            .chunk_size(self.chunk_size)
            .bounds(self.bounds())
            .serialize_mode(self.serialize_mode())
            .yield_interval(self.yield_interval)
            .progress_interval(self.progress_interval)
    }
}

impl LoaderConfig {
    /// An unloaded loader with the configured cache capacity.
    pub fn build_loader(&self) -> WorldLoader {
        WorldLoader::new(self.cache_capacity)
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Platform config directory for noaworld (`<config_dir>/noaworld`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join("noaworld"))
            .ok_or(ConfigError::NoConfigDir)
    }

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
            .separate_tuple_members(false)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(CONFIG_FILE), serialized).map_err(ConfigError::WriteError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let ron_str =
            ron::ser::to_string_pretty(&Config::default(), ron::ser::PrettyConfig::new())
                .unwrap();
        assert!(ron_str.contains("chunk_size: 32"));
        assert!(ron_str.contains("cache_capacity: 256"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.bake.bounds_min = (-10, 0, -3);
        config.terrain.amplitude = 8.5;
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let config: Config = ron::from_str("(bake: (chunk_size: 16))").unwrap();
        assert_eq!(config.bake.chunk_size, 16);
        assert!(config.bake.use_worker);
        assert_eq!(config.loader, LoaderConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.bake.chunk_size = 8;
        config.loader.release_after_load = true;
        config.debug.log_level = "debug".to_string();

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("noaworld");
        let config = Config::load_or_create(&nested).unwrap();
        assert_eq!(config, Config::default());
        assert!(nested.join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_bake_config_maps_to_baker() {
        let config = BakeConfig {
            chunk_size: 4,
            bounds_min: (-1, 0, 0),
            bounds_max: (1, 0, 1),
            use_worker: false,
            ..BakeConfig::default()
        };
        assert_eq!(config.serialize_mode(), SerializeMode::Inline);

        let baker = config
            .baker_builder()
            .generator(|_, size| vec![0; usize::from(size).pow(3)])
            .build()
            .expect("valid");
        assert_eq!(baker.chunk_size(), 4);
        assert_eq!(baker.chunk_count(), 6);
        assert_eq!(baker.bounds(), config.bounds());
    }

    #[test]
    fn test_loader_config_sets_capacity() {
        let loader = LoaderConfig {
            cache_capacity: 7,
            release_after_load: false,
        }
        .build_loader();
        assert_eq!(loader.cache_capacity(), 7);
    }
}
