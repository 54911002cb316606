//! Application configuration for [`super::KioskApp`].
//!
//! `AppConfig` gathers the per-component configs so the CLI translates the
//! config file in exactly one place.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_MEMORY_CAPACITY_BYTES;
use crate::config::ConfigFile;
use crate::http::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::playback::PlaybackConfig;
use crate::retry::RetryPolicy;
use crate::status::StatusConfig;
use crate::sync::{DownloadConfig, SyncConfig};

/// Where downloaded videos are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    /// Files under a directory; survives restarts.
    Disk(PathBuf),
    /// Process memory, bounded by total bytes.
    Memory { max_size_bytes: u64 },
}

/// Top-level configuration passed to [`super::KioskApp::start`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Manifest endpoint.
    pub manifest_url: String,

    pub api_key: Option<String>,

    /// Timeout for manifest and status requests.
    pub request_timeout: Duration,

    pub device_id: String,

    pub device_name: Option<String>,

    pub cache: CacheBackend,

    pub sync: SyncConfig,

    pub playback: PlaybackConfig,

    pub status: StatusConfig,
}

impl AppConfig {
    /// Creates a config with defaults for everything but the endpoint.
    pub fn new(manifest_url: impl Into<String>, cache_dir: PathBuf) -> Self {
        let device_id = crate::config::default_device_id();
        Self {
            manifest_url: manifest_url.into(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            status: StatusConfig::default().with_device(device_id.clone(), None),
            device_id,
            device_name: None,
            cache: CacheBackend::Disk(cache_dir),
            sync: SyncConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }

    /// Translates the config file into component configs.
    ///
    /// # Errors
    ///
    /// Fails when `manifest.url` is not set.
    pub fn from_config_file(config: &ConfigFile) -> Result<Self, crate::config::ConfigError> {
        let manifest_url = config.require_manifest_url()?.to_string();
        let api_key = config.manifest.api_key.clone();

        let download = DownloadConfig::default()
            .with_parallel(config.download.parallel)
            .with_timeout(Duration::from_secs(config.download.timeout_secs));

        let sync = SyncConfig::default()
            .with_poll_interval(Duration::from_secs(config.manifest.poll_interval_secs))
            .with_retry_delay(Duration::from_secs(config.manifest.retry_delay_secs))
            .with_prune_stale(config.cache.prune_stale)
            .with_fallback_url(config.manifest.fallback_url.clone())
            .with_download(download);

        let playback = PlaybackConfig::default()
            .with_retry_policy(RetryPolicy::linear(
                config.playback.max_retries,
                Duration::from_millis(config.playback.retry_delay_ms),
            ))
            .with_stall_timeout(Duration::from_secs(config.playback.stall_timeout_secs))
            .with_player(
                config.playback.player.clone(),
                config.playback.player_args_list(),
            );

        let status = StatusConfig::default()
            .with_url(config.status.url.clone())
            .with_interval(Duration::from_secs(config.status.interval_secs))
            .with_device(config.device.id.clone(), config.device.name.clone())
            .with_api_key(api_key.clone());

        Ok(Self {
            manifest_url,
            api_key,
            request_timeout: Duration::from_secs(config.manifest.timeout_secs),
            device_id: config.device.id.clone(),
            device_name: config.device.name.clone(),
            cache: CacheBackend::Disk(config.cache.directory.clone()),
            sync,
            playback,
            status,
        })
    }

    /// Keeps videos in memory instead of on disk.
    pub fn with_memory_cache(mut self) -> Self {
        self.cache = CacheBackend::Memory {
            max_size_bytes: DEFAULT_MEMORY_CAPACITY_BYTES,
        };
        self
    }

    pub fn with_cache(mut self, cache: CacheBackend) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self.status = self.status.with_api_key(self.api_key.clone());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_status(mut self, status: StatusConfig) -> Self {
        self.status = status;
        self
    }
}
