//! `noaworld`: bake, inspect, verify and extract `.noaworld` files.

mod commands;
mod terrain;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use noaworld_config::{CliArgs, Config};
use serde::Serialize;
use tracing::{error, info};

use crate::commands::CliError;

#[derive(Parser, Debug)]
#[command(name = "noaworld", about = "Baked voxel world tool", version)]
struct Cli {
    #[command(flatten)]
    overrides: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate demo heightmap terrain and write a world file.
    Bake {
        /// Output file.
        #[arg(short, long, default_value = "world.noaworld")]
        output: PathBuf,
    },
    /// Print header fields and chunk statistics as JSON.
    Inspect { path: PathBuf },
    /// Check integrity and extract every stored chunk.
    Verify { path: PathBuf },
    /// Print one chunk's voxels, layer by layer.
    Extract {
        path: PathBuf,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        #[arg(allow_negative_numbers = true)]
        z: i32,
        /// Print the flat voxel array as JSON instead.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = match cli.overrides.config.clone().map_or_else(Config::default_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&cli.overrides);

    let log_dir = config_dir.join("logs");
    noaworld_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &Config) -> Result<(), CliError> {
    match command {
        Command::Bake { output } => {
            let report = commands::bake(config, &output)?;
            info!(
                path = %report.path.display(),
                bytes = report.bytes,
                elapsed_ms = report.elapsed_ms,
                "wrote world"
            );
            print_json(&report)
        }
        Command::Inspect { path } => print_json(&commands::inspect(&path)?),
        Command::Verify { path } => {
            let report = commands::verify(&path, &config.loader)?;
            info!(chunks = report.chunks, extracted = report.extracted, "world verified");
            print_json(&report)
        }
        Command::Extract {
            path,
            x,
            y,
            z,
            json,
        } => {
            let view = commands::extract(&path, &config.loader, [x, y, z])?;
            if json {
                print_json(view.as_slice())
            } else {
                print!("{}", commands::format_layers(&view));
                Ok(())
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
