//! Cache management CLI commands.

use std::path::Path;

use clap::Subcommand;
use console::style;
use kioskplay::cache::{DiskCache, LocalCache};

use super::common::{format_size, load_config};
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List cached videos with their size and container
    List,
    /// Show cache totals
    Stats,
}

/// Run a cache subcommand.
pub fn run(path: &Path, action: CacheAction) -> Result<(), CliError> {
    let config = load_config(path)?;
    let directory = config.cache.directory.clone();
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Cache(format!("failed to create runtime: {}", e)))?;

    runtime.block_on(async move {
        let cache = DiskCache::open(directory.clone())
            .await
            .map_err(|e| CliError::Cache(e.to_string()))?;
        println!("Video cache: {}", directory.display());

        match action {
            CacheAction::List => {
                let names = cache.list().await.map_err(|e| CliError::Cache(e.to_string()))?;
                if names.is_empty() {
                    println!("  (empty)");
                }
                for name in names {
                    match cache.verify(&name).await {
                        Ok(video) => println!(
                            "  {:<40} {:>10}  {}",
                            name,
                            format_size(video.size_bytes),
                            video.container
                        ),
                        Err(e) => println!("  {:<40} {}", name, style(e).red()),
                    }
                }
            }
            CacheAction::Stats => {
                let usage = cache.usage().await.map_err(|e| CliError::Cache(e.to_string()))?;
                println!("  Files: {}", usage.files);
                println!("  Size:  {}", format_size(usage.bytes));
            }
        }
        Ok(())
    })
}
