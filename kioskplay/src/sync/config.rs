//! Configuration for the sync engine and its downloader.

use std::time::Duration;

use crate::retry::{RetryPolicy, DEFAULT_SYNC_RETRY_DELAY_SECS};

// ==================== Sync Defaults ====================

/// Default interval between manifest polls in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Shortest accepted poll interval in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Longest accepted poll interval in seconds (2 hours).
pub const MAX_POLL_INTERVAL_SECS: u64 = 7200;

// ==================== Download Defaults ====================

/// Default number of videos downloaded concurrently.
pub const DEFAULT_DOWNLOAD_PARALLEL: usize = 2;

/// Default per-video download timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Configuration for the sync engine and scheduler.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between successful polls, clamped to 30 s – 2 h.
    pub poll_interval: Duration,

    /// Retry policy after a failed poll (fixed 5 s by default).
    pub retry_policy: RetryPolicy,

    /// Remove cached files that are no longer in the manifest.
    ///
    /// Default: false.
    pub prune_stale: bool,

    /// Video published when the manifest has never been reachable.
    pub fallback_url: Option<String>,

    /// Download settings.
    pub download: DownloadConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            retry_policy: RetryPolicy::sync_default(),
            prune_stale: false,
            fallback_url: None,
            download: DownloadConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the poll interval, clamped into the accepted range.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = clamp_poll_interval(interval);
        self
    }

    /// Sets a fixed retry delay after failed polls.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_policy = RetryPolicy::fixed(crate::retry::UNBOUNDED, delay);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_prune_stale(mut self, prune: bool) -> Self {
        self.prune_stale = prune;
        self
    }

    /// Sets the fallback video URL; an empty string disables it.
    pub fn with_fallback_url(mut self, url: Option<String>) -> Self {
        self.fallback_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_download(mut self, download: DownloadConfig) -> Self {
        self.download = download;
        self
    }

    /// Delay before polling again after a failure.
    pub fn retry_delay(&self) -> Duration {
        self.retry_policy
            .delay_for_retry(1)
            .unwrap_or(Duration::from_secs(DEFAULT_SYNC_RETRY_DELAY_SECS))
    }
}

/// Configuration for video downloads.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum concurrent downloads (at least 1).
    pub parallel: usize,

    /// Timeout for a single video download.
    pub timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_DOWNLOAD_PARALLEL,
            timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Clamps a poll interval into `[MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS]`.
pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.clamp(
        Duration::from_secs(MIN_POLL_INTERVAL_SECS),
        Duration::from_secs(MAX_POLL_INTERVAL_SECS),
    )
}
