//! The sync engine: reconciles the remote manifest with the local cache.
//!
//! # Poll Flow
//!
//! ```text
//! poll() ──► in-flight? ──yes──► Skipped
//!               │ no
//!               ▼
//!         fetch manifest ──err──► ManifestUnavailable (playlist untouched)
//!               │
//!               ▼
//!         no videos? ──yes──► EmptyManifest (playlist untouched)
//!               │
//!               ▼
//!         version == applied? ──yes──► Unchanged
//!               │
//!               ▼
//!         acquire each video (≤ parallel at once, manifest order kept)
//!               │   failure ─► entry keeps its remote URL
//!               ▼
//!         publish Arc<Playlist> if it differs from the current one
//!               │
//!               ▼
//!         record version if every entry is cached
//! ```
//!
//! The engine is the only writer of the published playlist. Readers hold a
//! `watch::Receiver` and only ever see complete snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SyncConfig;
use super::download::{Acquired, Downloader};
use super::error::{DownloadError, SyncError, SyncResult};
use super::stats::{SyncStats, SyncStatsSnapshot};
use crate::cache::LocalCache;
use crate::manifest::{
    infer_mime_type, is_valid_filename, ManifestSource, ManifestVersion, Playlist,
    VideoDescriptor,
};

/// Result of a poll that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Another poll was already running.
    Skipped,
    /// The manifest version matches the last applied one.
    Unchanged { version: ManifestVersion },
    /// The manifest was reconciled.
    Applied(SyncReport),
}

/// What an applied poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Version of the reconciled manifest.
    pub version: ManifestVersion,
    /// Number of playlist entries.
    pub entries: usize,
    /// Entries whose verified copy was already cached.
    pub already_cached: usize,
    /// Entries downloaded during this poll.
    pub downloaded: usize,
    /// Entries that fell back to their remote URL.
    pub fallbacks: Vec<String>,
    /// Whether a new playlist snapshot was published.
    pub published: bool,
    /// Whether the version was recorded (every entry cached).
    pub complete: bool,
    /// Cached files removed because they left the manifest.
    pub pruned: Vec<String>,
}

/// Resets the in-flight flag when a poll ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single writer of the published playlist.
pub struct SyncEngine {
    source: Arc<dyn ManifestSource>,
    cache: Arc<dyn LocalCache>,
    downloader: Downloader,
    config: SyncConfig,
    playlist_tx: watch::Sender<Arc<Playlist>>,
    applied_version: Mutex<Option<ManifestVersion>>,
    in_flight: AtomicBool,
    manifest_published: AtomicBool,
    stats: SyncStats,
}

impl SyncEngine {
    /// Creates an engine with an empty published playlist.
    pub fn new(
        source: Arc<dyn ManifestSource>,
        cache: Arc<dyn LocalCache>,
        downloader: Downloader,
        config: SyncConfig,
    ) -> Self {
        let (playlist_tx, _) = watch::channel(Arc::new(Playlist::empty()));
        Self {
            source,
            cache,
            downloader,
            config,
            playlist_tx,
            applied_version: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            manifest_published: AtomicBool::new(false),
            stats: SyncStats::new(),
        }
    }

    /// Receiver of published playlist snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Playlist>> {
        self.playlist_tx.subscribe()
    }

    /// The currently published playlist.
    pub fn playlist(&self) -> Arc<Playlist> {
        self.playlist_tx.borrow().clone()
    }

    /// Version of the last fully applied manifest.
    pub fn applied_version(&self) -> Option<ManifestVersion> {
        self.applied_version.lock().clone()
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn LocalCache> {
        &self.cache
    }

    /// Location of the manifest, for logs.
    pub fn source(&self) -> &str {
        self.source.describe()
    }

    /// Runs one reconciliation pass.
    ///
    /// Returns `Ok(PollOutcome::Skipped)` without doing anything if another
    /// poll is in flight. Errors never modify the published playlist.
    pub async fn poll(&self, shutdown: &CancellationToken) -> SyncResult<PollOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Poll already in flight, skipping");
            self.stats.poll_skipped();
            return Ok(PollOutcome::Skipped);
        };
        self.stats.poll_started();

        let result = self.poll_inner(shutdown).await;
        match &result {
            Ok(PollOutcome::Applied(_)) => self.stats.poll_applied(),
            Ok(PollOutcome::Unchanged { .. }) => self.stats.poll_unchanged(),
            Ok(PollOutcome::Skipped) => {}
            Err(SyncError::Cancelled) => {}
            Err(_) => {
                self.stats.poll_failed();
                self.publish_fallback_if_needed();
            }
        }
        result
    }

    async fn poll_inner(&self, shutdown: &CancellationToken) -> SyncResult<PollOutcome> {
        let manifest = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(SyncError::Cancelled),
            result = self.source.fetch() => result?,
        };

        if manifest.videos.is_empty() {
            return Err(SyncError::EmptyManifest {
                url: self.source.describe().to_string(),
            });
        }

        let version = manifest.effective_version();
        if self.applied_version.lock().as_ref() == Some(&version) {
            debug!(version = %version, "Manifest unchanged");
            return Ok(PollOutcome::Unchanged { version });
        }

        let parallel = self.downloader.config().parallel.max(1);
        let acquired: Vec<(VideoDescriptor, Result<Acquired, DownloadError>)> =
            stream::iter(manifest.videos)
                .map(|video| async move {
                    let result = self.downloader.acquire(&video, shutdown).await;
                    (video, result)
                })
                .buffered(parallel)
                .collect()
                .await;

        if shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let mut report = SyncReport {
            version: version.clone(),
            entries: acquired.len(),
            already_cached: 0,
            downloaded: 0,
            fallbacks: Vec::new(),
            published: false,
            complete: false,
            pruned: Vec::new(),
        };

        let mut entries = Vec::with_capacity(acquired.len());
        for (video, result) in acquired {
            match result {
                Ok(acquired) => {
                    if let Acquired::Downloaded(cached) = &acquired {
                        report.downloaded += 1;
                        self.stats.download_completed(cached.size_bytes);
                    } else {
                        report.already_cached += 1;
                    }
                    entries.push(video.with_local_ref(acquired.into_cached().local_ref));
                }
                Err(e) => {
                    warn!(
                        filename = %video.filename,
                        kind = %e.kind(),
                        error = %e,
                        "Using remote URL for video"
                    );
                    self.stats.download_fell_back();
                    report.fallbacks.push(video.filename.clone());
                    entries.push(video);
                }
            }
        }

        let playlist = Playlist::new(entries);
        report.published = self.publish(playlist);
        self.manifest_published.store(true, Ordering::Release);

        report.complete = report.fallbacks.is_empty();
        if report.complete {
            *self.applied_version.lock() = Some(version.clone());
            if self.config.prune_stale {
                report.pruned = self.prune_stale().await;
            }
        }

        info!(
            version = %version,
            entries = report.entries,
            downloaded = report.downloaded,
            fallbacks = report.fallbacks.len(),
            published = report.published,
            "Sync applied"
        );
        Ok(PollOutcome::Applied(report))
    }

    /// Publishes `playlist` unless it equals the current snapshot.
    ///
    /// An equal playlist keeps the existing `Arc`, so readers see no change.
    fn publish(&self, playlist: Playlist) -> bool {
        self.playlist_tx.send_if_modified(|current| {
            if **current == playlist {
                false
            } else {
                *current = Arc::new(playlist);
                true
            }
        })
    }

    /// Publishes the configured fallback video if no manifest playlist has
    /// ever been published.
    fn publish_fallback_if_needed(&self) {
        if self.manifest_published.load(Ordering::Acquire) || !self.playlist_tx.borrow().is_empty()
        {
            return;
        }
        let Some(url) = self.config.fallback_url.as_deref() else {
            return;
        };
        let Some(video) = fallback_descriptor(url) else {
            warn!(url, "Fallback video URL has no usable filename");
            return;
        };
        info!(filename = %video.filename, "Publishing fallback video");
        self.publish(Playlist::new(vec![video]));
    }

    /// Removes cached files that are not in the published playlist.
    async fn prune_stale(&self) -> Vec<String> {
        let playlist = self.playlist();
        let names = match self.cache.list().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list cache for pruning");
                return Vec::new();
            }
        };

        let mut pruned = Vec::new();
        for name in names.into_iter().filter(|n| !playlist.contains(n)) {
            match self.cache.remove(&name).await {
                Ok(true) => {
                    info!(filename = %name, "Pruned stale video");
                    pruned.push(name);
                }
                Ok(false) => {}
                Err(e) => warn!(filename = %name, error = %e, "Failed to prune stale video"),
            }
        }
        pruned
    }
}

/// Builds the single fallback entry from a URL or local path.
fn fallback_descriptor(url: &str) -> Option<VideoDescriptor> {
    let name = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit(['/', '\\']).next())
        .filter(|name| is_valid_filename(name))?;
    let mime = infer_mime_type(name).unwrap_or("video/mp4");
    Some(VideoDescriptor::new(name, url, mime))
}
