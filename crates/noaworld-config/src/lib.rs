//! Settings for baking and loading `.noaworld` files.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Unknown fields are ignored and missing sections fall back to
//! defaults, so older and newer config files both load.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{BakeConfig, CONFIG_FILE, Config, DebugConfig, LoaderConfig, TerrainConfig};
pub use error::ConfigError;
