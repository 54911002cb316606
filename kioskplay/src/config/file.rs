//! The INI configuration file.
//!
//! ```ini
//! [manifest]
//! url = https://signage.example.com/api/content.php
//! api_key =
//! timeout = 15
//! poll_interval = 60
//! retry_delay = 5
//! fallback_url =
//!
//! [device]
//! id = kiosk-lobby
//! name = Lobby screen
//!
//! [cache]
//! directory = /home/pi/.local/share/kioskplay/videos
//! prune_stale = false
//!
//! [download]
//! parallel = 2
//! timeout = 300
//!
//! [playback]
//! max_retries = 3
//! retry_delay = 1000
//! stall_timeout = 5
//! player = mpv
//! player_args = --fs --no-terminal --really-quiet
//!
//! [status]
//! url =
//! interval = 60
//!
//! [logging]
//! level = info
//! directory =
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;

use super::error::ConfigError;
use super::keys::ConfigKey;
use super::{config_file_path, default_cache_dir, default_device_id};
use crate::http::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::playback::{DEFAULT_PLAYER, DEFAULT_PLAYER_ARGS, DEFAULT_STALL_TIMEOUT_SECS};
use crate::retry::{
    DEFAULT_PLAYBACK_MAX_RETRIES, DEFAULT_PLAYBACK_RETRY_DELAY_MS, DEFAULT_SYNC_RETRY_DELAY_SECS,
};
use crate::status::DEFAULT_STATUS_INTERVAL_SECS;
use crate::sync::{DEFAULT_DOWNLOAD_PARALLEL, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `[manifest]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSettings {
    /// Manifest endpoint; required to run.
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Fetch timeout in seconds.
    pub timeout_secs: u64,
    /// Poll interval in seconds (clamped to 30–7200 when used).
    pub poll_interval_secs: u64,
    /// Delay after a failed poll in seconds.
    pub retry_delay_secs: u64,
    /// Video played when the manifest has never been reachable.
    pub fallback_url: Option<String>,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            retry_delay_secs: DEFAULT_SYNC_RETRY_DELAY_SECS,
            fallback_url: None,
        }
    }
}

/// `[device]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub id: String,
    pub name: Option<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            name: None,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub prune_stale: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            prune_stale: false,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub parallel: usize,
    pub timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_DOWNLOAD_PARALLEL,
            timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

/// `[playback]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    pub stall_timeout_secs: u64,
    pub player: String,
    /// Whitespace-separated player arguments.
    pub player_args: String,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_PLAYBACK_MAX_RETRIES,
            retry_delay_ms: DEFAULT_PLAYBACK_RETRY_DELAY_MS,
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
            player: DEFAULT_PLAYER.to_string(),
            player_args: DEFAULT_PLAYER_ARGS.join(" "),
        }
    }
}

impl PlaybackSettings {
    /// Player arguments split on whitespace.
    pub fn player_args_list(&self) -> Vec<String> {
        self.player_args
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// `[status]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSettings {
    /// Status endpoint; `None` disables reporting.
    pub url: Option<String>,
    pub interval_secs: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: DEFAULT_STATUS_INTERVAL_SECS,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    /// Directory for daily log files; `None` logs to stdout only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub manifest: ManifestSettings,
    pub device: DeviceSettings,
    pub cache: CacheSettings,
    pub download: DownloadSettings,
    pub playback: PlaybackSettings,
    pub status: StatusSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Loads the file at the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads the file at `path`.
    ///
    /// Missing keys keep their defaults; unknown keys are ignored.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parses INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Saves to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves to `path`, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// The manifest URL, or an error naming the missing key.
    pub fn require_manifest_url(&self) -> Result<&str, ConfigError> {
        self.manifest
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingValue(ConfigKey::ManifestUrl.name().to_string()))
    }
}
