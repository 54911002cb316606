//! Sync command - run one manifest poll and print the playlist.

use std::path::Path;

use console::style;
use kioskplay::app::open_engine;
use kioskplay::sync::PollOutcome;
use tokio_util::sync::CancellationToken;

use super::common::format_size;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the sync command.
///
/// With `dry_run` videos are downloaded into memory and the cache directory
/// is left untouched.
pub fn run(path: &Path, dry_run: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(path)?;
    runner.log_startup("sync");
    let mut app_config = runner.app_config()?;
    if dry_run {
        app_config = app_config.with_memory_cache();
    }

    println!("Manifest: {}", app_config.manifest_url);
    if dry_run {
        println!("Dry run: downloads are kept in memory");
    }
    println!();

    runner.block_on(async {
        let engine = open_engine(&app_config).await?;
        let outcome = engine
            .poll(&CancellationToken::new())
            .await
            .map_err(kioskplay::app::AppError::from)?;

        match &outcome {
            PollOutcome::Applied(report) => {
                println!(
                    "{} version {}: {} entries ({} cached, {} downloaded)",
                    style("Synced").green().bold(),
                    report.version,
                    report.entries,
                    report.already_cached,
                    report.downloaded
                );
                for name in &report.fallbacks {
                    println!("  {} {} will stream from its URL", style("!").yellow(), name);
                }
                for name in &report.pruned {
                    println!("  removed {}", name);
                }
            }
            PollOutcome::Unchanged { version } => println!("Unchanged at version {}", version),
            PollOutcome::Skipped => println!("Another sync is running"),
        }

        let playlist = engine.playlist();
        println!();
        println!("Playlist ({} entries)", playlist.len());
        for (index, video) in playlist.iter().enumerate() {
            let marker = if video.is_cached() {
                style("cached").green()
            } else {
                style("remote").yellow()
            };
            println!("  {:>3}. {:<40} {}", index + 1, video.filename, marker);
        }

        let usage = engine
            .cache()
            .usage()
            .await
            .map_err(|e| CliError::Cache(e.to_string()))?;
        println!();
        println!(
            "Cache: {} files, {}",
            usage.files,
            format_size(usage.bytes)
        );
        Ok::<(), CliError>(())
    })
}
