//! Structured logging for the noaworld tools.
//!
//! Console output with uptime timestamps and thread names (the pack worker is
//! named), plus JSON file logging in debug builds. The level comes from
//! `RUST_LOG` when set, otherwise from the config.

use std::path::{Path, PathBuf};

use noaworld_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "info";

/// File name of the JSON log inside the log directory.
pub const LOG_FILE: &str = "noaworld.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - Directory for the JSON log file (debug builds only)
/// * `debug_build` - Whether file logging is allowed
/// * `config` - Optional configuration for the level and file toggle
///
/// Calling this twice in one process panics, as with any global subscriber.
///
/// ```no_run
/// use noaworld_config::Config;
/// use noaworld_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let file_allowed = config.is_none_or(|c| c.debug.log_to_file);
    if debug_build
        && file_allowed
        && let Some(log_path) = log_dir.map(log_file_path)
        && let Some(parent) = log_path.parent()
        && std::fs::create_dir_all(parent).is_ok()
        && let Ok(log_file) = std::fs::File::create(&log_path)
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Filter directive taken from the config, or [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> String {
    config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Where the JSON log goes for a given log directory.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE)
}
