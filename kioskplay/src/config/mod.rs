//! Persistent configuration.
//!
//! Settings live in an INI file under the user's config directory
//! (`~/.config/kioskplay/config.ini` on Linux). Every setting is addressable
//! as `section.key` through [`ConfigKey`].

mod error;
mod file;
mod keys;

use std::path::PathBuf;

pub use error::ConfigError;
pub use file::{
    CacheSettings, ConfigFile, DeviceSettings, DownloadSettings, LoggingSettings,
    ManifestSettings, PlaybackSettings, StatusSettings, DEFAULT_LOG_LEVEL,
};
pub use keys::ConfigKey;

/// Application directory name under the platform config and data dirs.
pub const APP_DIR: &str = "kioskplay";

/// Device id used when the hostname cannot be determined.
pub const DEFAULT_DEVICE_ID: &str = "kiosk";

/// Directory holding the config file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Path of the config file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default video cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("videos")
}

/// Default device id: `kiosk-<hostname>`, or [`DEFAULT_DEVICE_ID`].
pub fn default_device_id() -> String {
    hostname()
        .map(|host| format!("{}-{}", DEFAULT_DEVICE_ID, host))
        .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string())
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}
