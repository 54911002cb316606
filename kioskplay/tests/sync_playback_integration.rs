//! Integration tests for sync and playback.
//!
//! These tests drive the public API end to end:
//! - manifest fetch → download → published playlist
//! - unchanged versions skip all downloads
//! - a new version swaps entries without restarting the current video
//!
//! Run with: `cargo test --test sync_playback_integration`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use kioskplay::app::{AppComponents, AppConfig, KioskApp};
use kioskplay::cache::{LocalCache, MemoryCache};
use kioskplay::http::{AsyncHttpClient, BoxFuture, HttpError, RequestHeaders};
use kioskplay::manifest::{HttpManifestSource, PlaybackSource};
use kioskplay::playback::{
    sink_channel, LoadId, OutputSink, PlaybackConfig, PlaybackLoop, PlaybackState, PlayerEvent,
    SinkError, SinkEvent, SinkEventKind, SinkEventSender,
};
use kioskplay::sync::{DownloadConfig, Downloader, PollOutcome, SyncConfig, SyncEngine};

// ============================================================================
// Helpers
// ============================================================================

const MANIFEST: &str = "http://x/api/content.php";

/// Smallest body the cache accepts as an MP4.
fn mp4(len: usize) -> Bytes {
    let mut data = vec![0x00, 0x00, 0x00, 0x18];
    data.extend_from_slice(b"ftypisom");
    data.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    data.resize(len, 0x42);
    Bytes::from(data)
}

fn manifest(version: &str, names: &[&str]) -> Value {
    let videos: Vec<Value> = names
        .iter()
        .map(|n| json!({ "filename": n, "url": format!("http://x/{}", n) }))
        .collect();
    json!({ "version": version, "content": { "videos": videos } })
}

/// HTTP stub serving fixed bodies and counting GETs per URL.
#[derive(Default)]
struct StubHttp {
    bodies: Mutex<HashMap<String, Bytes>>,
    gets: Mutex<HashMap<String, usize>>,
}

impl StubHttp {
    fn serve(&self, url: &str, body: Bytes) {
        self.bodies.lock().insert(url.to_string(), body);
    }

    fn serve_manifest(&self, version: &str, names: &[&str]) {
        let body = serde_json::to_vec(&manifest(version, names)).unwrap();
        self.serve(MANIFEST, Bytes::from(body));
    }

    fn gets(&self, url: &str) -> usize {
        self.gets.lock().get(url).copied().unwrap_or(0)
    }

    fn video_gets(&self) -> usize {
        self.gets
            .lock()
            .iter()
            .filter(|(url, _)| url.ends_with(".mp4"))
            .map(|(_, n)| n)
            .sum()
    }
}

impl AsyncHttpClient for StubHttp {
    fn get(&self, url: &str, _headers: &RequestHeaders) -> BoxFuture<'_, Result<Bytes, HttpError>> {
        *self.gets.lock().entry(url.to_string()).or_default() += 1;
        let result = self
            .bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| HttpError::Status {
                url: url.to_string(),
                status: 404,
            });
        Box::pin(async move { result })
    }

    fn post_json(
        &self,
        _url: &str,
        _headers: &RequestHeaders,
        _body: Value,
    ) -> BoxFuture<'_, Result<u16, HttpError>> {
        Box::pin(async { Ok(200) })
    }
}

/// Output sink that records what it was asked to play.
#[derive(Clone, Default)]
struct LoggingSink {
    loads: Arc<Mutex<Vec<(LoadId, String)>>>,
}

impl LoggingSink {
    fn locations(&self) -> Vec<String> {
        self.loads.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    fn last_load(&self) -> LoadId {
        self.loads.lock().last().map(|(id, _)| *id).unwrap()
    }
}

impl OutputSink for LoggingSink {
    fn load(&mut self, load_id: LoadId, source: &PlaybackSource<'_>) -> Result<(), SinkError> {
        self.loads.lock().push((load_id, source.location()));
        Ok(())
    }

    fn release(&mut self) {}

    fn name(&self) -> &str {
        "logging"
    }
}

fn engine(http: Arc<StubHttp>, cache: Arc<MemoryCache>) -> SyncEngine {
    let source = Arc::new(HttpManifestSource::new(http.clone(), MANIFEST, None, "kiosk-test"));
    let downloader = Downloader::new(http, cache.clone(), DownloadConfig::default());
    SyncEngine::new(source, cache, downloader, SyncConfig::default())
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Three polls: initial sync, unchanged version, then `b.mp4` replaced by `c.mp4`.
#[tokio::test]
async fn test_version_swap_keeps_current_video_playing() {
    let http = Arc::new(StubHttp::default());
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        http.serve(&format!("http://x/{}", name), mp4(256));
    }
    let cache = Arc::new(MemoryCache::default());
    let engine = engine(http.clone(), cache.clone());
    let shutdown = CancellationToken::new();

    let sink = LoggingSink::default();
    let mut player = PlaybackLoop::new(Box::new(sink.clone()), PlaybackConfig::default());

    // Poll 1: both videos downloaded, playback starts at index 0.
    http.serve_manifest("1", &["a.mp4", "b.mp4"]);
    let PollOutcome::Applied(report) = engine.poll(&shutdown).await.unwrap() else {
        panic!("first poll should apply");
    };
    assert_eq!(report.downloaded, 2);
    assert!(report.complete);
    assert_eq!(engine.playlist().filenames(), vec!["a.mp4", "b.mp4"]);

    player.handle(PlayerEvent::PlaylistUpdated(engine.playlist()));
    player.handle_sink_event(SinkEvent::new(sink.last_load(), SinkEventKind::Started));
    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(player.current_video(), Some("a.mp4"));
    assert_eq!(sink.locations(), vec!["memory://a.mp4".to_string()]);

    // Poll 2: same version, nothing downloaded.
    let before = http.video_gets();
    let outcome = engine.poll(&shutdown).await.unwrap();
    assert!(matches!(outcome, PollOutcome::Unchanged { .. }));
    assert_eq!(http.video_gets(), before);

    // Poll 3: b.mp4 removed, c.mp4 added.
    http.serve_manifest("2", &["a.mp4", "c.mp4"]);
    let PollOutcome::Applied(report) = engine.poll(&shutdown).await.unwrap() else {
        panic!("third poll should apply");
    };
    assert_eq!(report.already_cached, 1);
    assert_eq!(report.downloaded, 1);
    assert_eq!(http.gets("http://x/a.mp4"), 1);
    assert_eq!(http.gets("http://x/c.mp4"), 1);

    let playlist = engine.playlist();
    assert_eq!(playlist.filenames(), vec!["a.mp4", "c.mp4"]);
    assert!(playlist.entries().iter().all(|v| v.is_cached()));

    // a.mp4 keeps playing; no new load is issued.
    player.handle(PlayerEvent::PlaylistUpdated(playlist));
    assert_eq!(player.state(), PlaybackState::Playing);
    assert_eq!(player.current_video(), Some("a.mp4"));
    assert_eq!(sink.locations().len(), 1);

    // When a.mp4 ends, playback continues with c.mp4.
    player.handle_sink_event(SinkEvent::new(sink.last_load(), SinkEventKind::Ended));
    assert_eq!(
        sink.locations(),
        vec!["memory://a.mp4".to_string(), "memory://c.mp4".to_string()]
    );

    assert_eq!(cache.usage().await.unwrap().files, 3);
}

/// The same scenario through the scheduler and driver tasks.
#[tokio::test(start_paused = true)]
async fn test_running_kiosk_follows_manifest_updates() {
    let http = Arc::new(StubHttp::default());
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        http.serve(&format!("http://x/{}", name), mp4(256));
    }
    http.serve_manifest("1", &["a.mp4", "b.mp4"]);

    let sink = LoggingSink::default();
    let (events, sink_events): (SinkEventSender, _) = sink_channel();
    let components = AppComponents {
        http: http.clone(),
        download_http: http.clone(),
        sink: Box::new(sink.clone()),
        sink_events,
    };
    let config = AppConfig::new(MANIFEST, std::env::temp_dir()).with_memory_cache();
    let app = KioskApp::start_with(config, components).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.locations(), vec!["memory://a.mp4".to_string()]);
    events
        .send(SinkEvent::new(sink.last_load(), SinkEventKind::Started))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.playback_status().state, PlaybackState::Playing);

    // Next scheduled poll picks up version 2.
    http.serve_manifest("2", &["a.mp4", "c.mp4"]);
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(app.engine().playlist().filenames(), vec!["a.mp4", "c.mp4"]);
    assert_eq!(app.playback_status().current_video.as_deref(), Some("a.mp4"));
    assert_eq!(sink.locations().len(), 1);
    assert!(http.gets(MANIFEST) >= 2);

    app.shutdown().await;
}
