//! kioskplay CLI - Command-line interface
//!
//! Drives the kioskplay library: configure the device, test the manifest,
//! inspect the cache and run the kiosk.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::common::resolve_config_path;

#[derive(Debug, Parser)]
#[command(name = "kioskplay", version, about = "Unattended digital-signage video player")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the config file for a manifest endpoint
    Init {
        /// Manifest URL (http:// or https://)
        manifest_url: String,
        /// Device id sent with every request
        #[arg(long)]
        device_id: Option<String>,
    },
    /// Play the playlist until Ctrl+C
    Run,
    /// Poll the manifest once and print the resulting playlist
    Sync {
        /// Keep downloads in memory instead of the cache directory
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect the video cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = resolve_config_path(cli.config);

    let result = match cli.command {
        Commands::Init {
            manifest_url,
            device_id,
        } => commands::init::run(&path, &manifest_url, device_id.as_deref()),
        Commands::Run => commands::run::run(&path),
        Commands::Sync { dry_run } => commands::sync::run(&path, dry_run),
        Commands::Cache { action } => commands::cache::run(&path, action),
        Commands::Config { command } => commands::config::run(&path, command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
