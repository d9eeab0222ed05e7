//! Command-line overrides shared by the noaworld tools.

use std::path::PathBuf;

use clap::Args;

use crate::Config;

/// Global options that override settings loaded from `config.ron`.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Chunk edge length in voxels.
    #[arg(long, global = true)]
    pub chunk_size: Option<u32>,

    /// Loader cache capacity in chunks.
    #[arg(long, global = true)]
    pub cache_capacity: Option<usize>,

    /// Pack on the calling thread instead of a worker.
    #[arg(long, global = true)]
    pub no_worker: bool,

    /// Terrain noise seed.
    #[arg(long, global = true)]
    pub seed: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(size) = args.chunk_size {
            self.bake.chunk_size = size;
        }
        if let Some(capacity) = args.cache_capacity {
            self.loader.cache_capacity = capacity;
        }
        if args.no_worker {
            self.bake.use_worker = false;
        }
        if let Some(seed) = args.seed {
            self.terrain.seed = seed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
