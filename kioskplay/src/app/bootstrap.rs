//! Application bootstrap implementation.
//!
//! Wires the cache, sync engine, playback loop and status reporter together
//! and owns the tasks that run them. Startup order matters: the engine must
//! exist before the playback driver subscribes to its playlist.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::{AppConfig, CacheBackend};
use super::error::AppError;
use crate::cache::{DiskCache, LocalCache, MemoryCache};
use crate::http::{AsyncHttpClient, ReqwestClient, RequestHeaders};
use crate::manifest::HttpManifestSource;
use crate::playback::{
    sink_channel, CommandSink, OutputSink, PlaybackDriver, PlaybackLoop, PlaybackStatus,
    SinkEventReceiver,
};
use crate::status::StatusReporter;
use crate::sync::{Downloader, SyncEngine, SyncScheduler};

/// External collaborators of a running kiosk.
///
/// [`KioskApp::start`] builds these from the config; tests supply their own.
pub struct AppComponents {
    /// Client for manifest and status requests.
    pub http: Arc<dyn AsyncHttpClient>,
    /// Client for video downloads.
    pub download_http: Arc<dyn AsyncHttpClient>,
    /// Output the playback loop drives.
    pub sink: Box<dyn OutputSink>,
    /// Events emitted by `sink`.
    pub sink_events: SinkEventReceiver,
}

impl AppComponents {
    /// Real HTTP clients and the configured external player.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let http = Arc::new(ReqwestClient::with_timeout(config.request_timeout)?);
        let download_http = Arc::new(ReqwestClient::with_timeout(config.sync.download.timeout)?);
        let (events_tx, sink_events) = sink_channel();
        let sink = CommandSink::new(
            config.playback.player.clone(),
            config.playback.player_args.clone(),
            events_tx,
        );
        Ok(Self {
            http,
            download_http,
            sink: Box::new(sink),
            sink_events,
        })
    }
}

/// Opens the configured cache and builds a sync engine over it.
///
/// Used by [`KioskApp`] and by one-shot syncs.
pub async fn build_engine(
    config: &AppConfig,
    http: Arc<dyn AsyncHttpClient>,
    download_http: Arc<dyn AsyncHttpClient>,
) -> Result<Arc<SyncEngine>, AppError> {
    let cache: Arc<dyn LocalCache> = match &config.cache {
        CacheBackend::Disk(directory) => Arc::new(DiskCache::open(directory.clone()).await?),
        CacheBackend::Memory { max_size_bytes } => Arc::new(MemoryCache::new(*max_size_bytes)),
    };
    info!(backend = cache.name(), "Video cache opened");

    let source = Arc::new(HttpManifestSource::new(
        http,
        config.manifest_url.clone(),
        config.api_key.as_deref(),
        &config.device_id,
    ));

    let headers = RequestHeaders::new()
        .with("X-Device-Id", config.device_id.clone())
        .with_api_key(config.api_key.as_deref());
    let downloader = Downloader::new(download_http, cache.clone(), config.sync.download.clone())
        .with_headers(headers);

    Ok(Arc::new(SyncEngine::new(
        source,
        cache,
        downloader,
        config.sync.clone(),
    )))
}

/// Builds an engine with real HTTP clients.
pub async fn open_engine(config: &AppConfig) -> Result<Arc<SyncEngine>, AppError> {
    let http = Arc::new(ReqwestClient::with_timeout(config.request_timeout)?);
    let download_http = Arc::new(ReqwestClient::with_timeout(config.sync.download.timeout)?);
    build_engine(config, http, download_http).await
}

/// A running kiosk.
///
/// # Example
///
/// ```ignore
/// let app = KioskApp::start(AppConfig::from_config_file(&config)?).await?;
/// app.wait().await;
/// app.shutdown().await;
/// ```
pub struct KioskApp {
    engine: Arc<SyncEngine>,
    status_rx: watch::Receiver<PlaybackStatus>,
    shutdown: CancellationToken,
    scheduler: JoinHandle<()>,
    reporter: JoinHandle<()>,
    playback: JoinHandle<PlaybackLoop>,
}

impl KioskApp {
    /// Starts the kiosk with real HTTP clients and the configured player.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        let components = AppComponents::from_config(&config)?;
        Self::start_with(config, components).await
    }

    /// Starts the kiosk with the given collaborators.
    pub async fn start_with(config: AppConfig, components: AppComponents) -> Result<Self, AppError> {
        info!(
            manifest = %config.manifest_url,
            device_id = %config.device_id,
            "Starting kiosk"
        );

        let engine = build_engine(
            &config,
            components.http.clone(),
            components.download_http,
        )
        .await?;
        let shutdown = CancellationToken::new();

        // Subscribe before the first poll so the driver sees every snapshot.
        let machine = PlaybackLoop::new(components.sink, config.playback.clone());
        let driver = PlaybackDriver::new(machine, engine.subscribe(), components.sink_events);
        let status_rx = driver.status_receiver();
        let playback = tokio::spawn(driver.run(shutdown.clone()));

        let scheduler = tokio::spawn(SyncScheduler::new(engine.clone()).run(shutdown.clone()));

        let reporter = StatusReporter::new(
            components.http,
            config.status.clone(),
            engine.clone(),
            status_rx.clone(),
        );
        let reporter = tokio::spawn(reporter.run(shutdown.clone()));

        Ok(Self {
            engine,
            status_rx,
            shutdown,
            scheduler,
            reporter,
            playback,
        })
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Latest playback status.
    pub fn playback_status(&self) -> PlaybackStatus {
        self.status_rx.borrow().clone()
    }

    pub fn status_receiver(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_rx.clone()
    }

    /// Token that stops the kiosk when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits until shutdown is requested.
    pub async fn wait(&self) {
        self.shutdown.cancelled().await;
    }

    /// Stops every task and releases the output sink.
    pub async fn shutdown(self) {
        info!("Shutting down kiosk");
        self.shutdown.cancel();

        if let Err(e) = self.scheduler.await {
            warn!(error = %e, "Sync scheduler task failed");
        }
        if let Err(e) = self.reporter.await {
            warn!(error = %e, "Status reporter task failed");
        }
        match self.playback.await {
            Ok(machine) => info!(state = %machine.state(), "Playback stopped"),
            Err(e) => warn!(error = %e, "Playback task failed"),
        }

        info!(stats = %self.engine.stats(), "Kiosk stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::probe::tests::sample_mp4;
    use crate::http::tests::MockHttpClient;
    use crate::playback::sink::tests::RecordingSink;
    use crate::playback::PlaybackState;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;

    const MANIFEST: &str = "http://signage.test/api/content.php";

    fn components(client: Arc<MockHttpClient>, sink: RecordingSink) -> AppComponents {
        let (_tx, sink_events) = sink_channel();
        AppComponents {
            http: client.clone(),
            download_http: client,
            sink: Box::new(sink),
            sink_events,
        }
    }

    fn config() -> AppConfig {
        AppConfig::new(MANIFEST, PathBuf::from("/unused")).with_memory_cache()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_syncs_and_plays() {
        let client = Arc::new(MockHttpClient::new());
        client.respond("http://signage.test/videos/a.mp4", sample_mp4(64));
        client.respond_json(
            MANIFEST,
            json!({ "version": 1, "content": { "videos": [
                { "filename": "a.mp4", "url": "http://signage.test/videos/a.mp4" }
            ] } }),
        );
        let sink = RecordingSink::new();

        let app = KioskApp::start_with(config(), components(client.clone(), sink.clone()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(app.engine().playlist().len(), 1);
        assert_eq!(sink.loaded_locations(), vec!["memory://a.mp4".to_string()]);
        assert_eq!(app.playback_status().current_video.as_deref(), Some("a.mp4"));
        let headers = client.last_headers(MANIFEST).unwrap();
        assert!(headers.get("X-Device-Id").is_some());

        app.shutdown().await;
        assert_eq!(sink.log.lock().outstanding, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_manifest_stays_idle() {
        let client = Arc::new(MockHttpClient::new());
        client.fail(
            MANIFEST,
            crate::http::HttpError::Status {
                url: MANIFEST.to_string(),
                status: 503,
            },
        );
        let sink = RecordingSink::new();

        let app = KioskApp::start_with(config(), components(client, sink.clone()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;

        assert!(sink.loaded_locations().is_empty());
        assert_eq!(app.playback_status().state, PlaybackState::Idle);
        assert!(app.engine().stats().failures >= 2);

        let token = app.shutdown_token();
        token.cancel();
        app.wait().await;
        app.shutdown().await;
    }
}
