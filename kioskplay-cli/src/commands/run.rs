//! Run command - play the kiosk playlist until Ctrl+C.

use std::path::Path;

use console::style;
use kioskplay::app::KioskApp;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the run command.
pub fn run(path: &Path) -> Result<(), CliError> {
    let runner = CliRunner::new(path)?;
    runner.log_startup("run");
    let app_config = runner.app_config()?;

    println!("{}", style(format!("kioskplay v{}", kioskplay::VERSION)).bold());
    println!("===============");
    println!();
    println!("Manifest: {}", app_config.manifest_url);
    println!("Device:   {}", app_config.device_id);
    println!("Player:   {}", app_config.playback.player);
    println!("Cache:    {}", runner.config().cache.directory.display());
    if let Some(url) = &app_config.status.url {
        println!("Status:   {}", url);
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = runner.shutdown_on_ctrlc("Received shutdown signal, stopping playback...")?;

    runner.block_on(async {
        let app = KioskApp::start(app_config).await?;
        let app_shutdown = app.shutdown_token();
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = app_shutdown.cancelled() => {}
        }

        let stats = app.engine().stats();
        app.shutdown().await;

        println!();
        println!("Session Summary");
        println!("───────────────");
        println!("  Polls:     {} ({} failed)", stats.polls, stats.failures);
        println!("  Updates:   {}", stats.applied);
        println!("  Downloads: {}", stats.downloads);
        Ok::<(), CliError>(())
    })
}
