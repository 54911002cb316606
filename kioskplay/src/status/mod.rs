//! Periodic device status reports.
//!
//! Every `interval` the reporter POSTs a JSON document describing the device
//! and what it is playing. Reports are fire-and-forget: failures are logged
//! and never reach the playback loop.
//!
//! ```json
//! {
//!   "device_id": "kiosk-lobby",
//!   "device_name": "Lobby screen",
//!   "timestamp": "2024-05-01T12:00:00+00:00",
//!   "status": "playing",
//!   "state": "playing a.mp4 (1/3)",
//!   "current_video": "a.mp4",
//!   "version": "1714564800",
//!   "cached_videos": 3,
//!   "cache_bytes": 73400320
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{AsyncHttpClient, HttpError, RequestHeaders};
use crate::playback::{PlaybackState, PlaybackStatus};
use crate::sync::SyncEngine;

/// Default interval between status reports in seconds.
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 60;

/// Configuration for the status reporter.
#[derive(Debug, Clone)]
pub struct StatusConfig {
    /// Report endpoint; `None` disables reporting.
    pub url: Option<String>,
    pub interval: Duration,
    pub device_id: String,
    pub device_name: Option<String>,
    pub api_key: Option<String>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval: Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS),
            device_id: crate::config::DEFAULT_DEVICE_ID.to_string(),
            device_name: None,
            api_key: None,
        }
    }
}

impl StatusConfig {
    /// Sets the endpoint; an empty string disables reporting.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn with_device(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.device_id = id.into();
        self.device_name = name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

/// Body of a status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub device_id: String,
    pub device_name: Option<String>,
    pub timestamp: String,
    pub status: &'static str,
    pub state: String,
    pub current_video: Option<String>,
    pub version: Option<String>,
    pub cached_videos: u64,
    pub cache_bytes: u64,
}

/// Coarse status word for the report.
fn status_word(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Idle => "idle",
        PlaybackState::Stalled => "error",
        PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Advancing => "playing",
    }
}

/// POSTs status reports on an interval.
pub struct StatusReporter {
    client: Arc<dyn AsyncHttpClient>,
    config: StatusConfig,
    headers: RequestHeaders,
    engine: Arc<SyncEngine>,
    playback: watch::Receiver<PlaybackStatus>,
}

impl StatusReporter {
    pub fn new(
        client: Arc<dyn AsyncHttpClient>,
        config: StatusConfig,
        engine: Arc<SyncEngine>,
        playback: watch::Receiver<PlaybackStatus>,
    ) -> Self {
        let headers = RequestHeaders::new()
            .with("X-Device-Id", config.device_id.clone())
            .with_api_key(config.api_key.as_deref());
        Self {
            client,
            config,
            headers,
            engine,
            playback,
        }
    }

    /// Builds the current report.
    pub async fn build_report(&self) -> StatusReport {
        let playback = self.playback.borrow().clone();
        let usage = match self.engine.cache().usage().await {
            Ok(usage) => usage,
            Err(e) => {
                debug!(error = %e, "Cache usage unavailable for status report");
                Default::default()
            }
        };

        StatusReport {
            device_id: self.config.device_id.clone(),
            device_name: self.config.device_name.clone(),
            timestamp: chrono::Local::now().to_rfc3339(),
            status: status_word(playback.state),
            state: playback.to_string(),
            current_video: playback.current_video,
            version: self.engine.applied_version().map(|v| v.to_string()),
            cached_videos: usage.files,
            cache_bytes: usage.bytes,
        }
    }

    /// Sends one report.
    pub async fn report(&self) -> Result<(), HttpError> {
        let Some(url) = self.config.url.as_deref() else {
            return Ok(());
        };
        let report = self.build_report().await;
        let body = serde_json::to_value(&report).map_err(|e| HttpError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.client.post_json(url, &self.headers, body).await?;
        debug!(url, state = %report.state, "Status reported");
        Ok(())
    }

    /// Reports every interval until `shutdown` is cancelled.
    ///
    /// Returns immediately when no URL is configured.
    pub async fn run(self, shutdown: CancellationToken) {
        let Some(url) = self.config.url.clone() else {
            debug!("Status reporting disabled");
            return;
        };
        info!(url = %url, interval_secs = self.config.interval.as_secs(), "Status reporter started");

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.report().await {
                        warn!(error = %e, "Status report failed");
                    }
                }
            }
        }

        info!("Status reporter stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::probe::tests::sample_mp4;
    use crate::cache::MemoryCache;
    use crate::http::tests::MockHttpClient;
    use crate::manifest::HttpManifestSource;
    use crate::sync::{DownloadConfig, Downloader, SyncConfig};
    use serde_json::json;

    const MANIFEST: &str = "http://signage.test/api/content.php";
    const STATUS: &str = "http://signage.test/api/update.php";
    const VIDEO: &str = "http://signage.test/videos/a.mp4";

    async fn engine(client: Arc<MockHttpClient>) -> Arc<SyncEngine> {
        client.respond(VIDEO, sample_mp4(100));
        client.respond_json(
            MANIFEST,
            json!({ "version": 9, "content": { "videos": [{ "filename": "a.mp4", "url": VIDEO }] } }),
        );
        let cache = Arc::new(MemoryCache::default());
        let source = Arc::new(HttpManifestSource::new(client.clone(), MANIFEST, None, "k"));
        let downloader = Downloader::new(client, cache.clone(), DownloadConfig::default());
        let engine = Arc::new(SyncEngine::new(source, cache, downloader, SyncConfig::default()));
        engine.poll(&CancellationToken::new()).await.unwrap();
        engine
    }

    fn config() -> StatusConfig {
        StatusConfig::default()
            .with_url(Some(STATUS.to_string()))
            .with_device("kiosk-lobby", Some("Lobby".to_string()))
            .with_api_key(Some("secret".to_string()))
    }

    fn playing() -> PlaybackStatus {
        PlaybackStatus {
            state: PlaybackState::Playing,
            current_video: Some("a.mp4".to_string()),
            index: Some(0),
            retry_count: 0,
            playlist_len: 1,
            cached: true,
        }
    }

    #[tokio::test]
    async fn test_report_body_and_headers() {
        let client = Arc::new(MockHttpClient::new());
        let engine = engine(client.clone()).await;
        let (_tx, rx) = watch::channel(playing());
        let reporter = StatusReporter::new(client.clone(), config(), engine, rx);

        reporter.report().await.unwrap();

        let posts = client.posts();
        assert_eq!(posts.len(), 1);
        let (url, body) = &posts[0];
        assert_eq!(url, STATUS);
        assert_eq!(body["device_id"], "kiosk-lobby");
        assert_eq!(body["device_name"], "Lobby");
        assert_eq!(body["status"], "playing");
        assert_eq!(body["current_video"], "a.mp4");
        assert_eq!(body["version"], "9");
        assert_eq!(body["cached_videos"], 1);
        assert_eq!(body["cache_bytes"], 100);
        assert!(body["timestamp"].as_str().is_some());

        let headers = client.last_post_headers(STATUS).unwrap();
        assert_eq!(headers.get("X-API-Key"), Some("secret"));
        assert_eq!(headers.get("X-Device-Id"), Some("kiosk-lobby"));
    }

    #[tokio::test]
    async fn test_disabled_reporter_sends_nothing() {
        let client = Arc::new(MockHttpClient::new());
        let engine = engine(client.clone()).await;
        let (_tx, rx) = watch::channel(PlaybackStatus::default());
        let reporter = StatusReporter::new(
            client.clone(),
            StatusConfig::default().with_url(Some(String::new())),
            engine,
            rx,
        );

        reporter.report().await.unwrap();
        reporter.run(CancellationToken::new()).await;
        assert!(client.posts().is_empty());
    }

    #[tokio::test]
    async fn test_report_failure_is_error_not_panic() {
        let client = Arc::new(MockHttpClient::new());
        let engine = engine(client.clone()).await;
        client.fail(
            STATUS,
            HttpError::Status {
                url: STATUS.to_string(),
                status: 500,
            },
        );
        let (_tx, rx) = watch::channel(PlaybackStatus::default());
        let reporter = StatusReporter::new(client, config(), engine, rx);

        assert!(reporter.report().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_on_interval() {
        let client = Arc::new(MockHttpClient::new());
        let engine = engine(client.clone()).await;
        let (_tx, rx) = watch::channel(playing());
        let reporter = StatusReporter::new(client.clone(), config(), engine, rx);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(reporter.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(client.posts().len(), 3);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_status_word() {
        assert_eq!(status_word(PlaybackState::Idle), "idle");
        assert_eq!(status_word(PlaybackState::Stalled), "error");
        assert_eq!(status_word(PlaybackState::Loading), "playing");
    }
}
