//! Addressable configuration keys.
//!
//! Every setting in [`ConfigFile`] has a `section.key` name used by the
//! `config get`/`config set` commands and by the INI reader and writer.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConfigError;
use super::file::ConfigFile;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ManifestUrl,
    ManifestApiKey,
    ManifestTimeout,
    ManifestPollInterval,
    ManifestRetryDelay,
    ManifestFallbackUrl,
    DeviceId,
    DeviceName,
    CacheDirectory,
    CachePruneStale,
    DownloadParallel,
    DownloadTimeout,
    PlaybackMaxRetries,
    PlaybackRetryDelay,
    PlaybackStallTimeout,
    PlaybackPlayer,
    PlaybackPlayerArgs,
    StatusUrl,
    StatusInterval,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        use ConfigKey::*;
        &[
            ManifestUrl,
            ManifestApiKey,
            ManifestTimeout,
            ManifestPollInterval,
            ManifestRetryDelay,
            ManifestFallbackUrl,
            DeviceId,
            DeviceName,
            CacheDirectory,
            CachePruneStale,
            DownloadParallel,
            DownloadTimeout,
            PlaybackMaxRetries,
            PlaybackRetryDelay,
            PlaybackStallTimeout,
            PlaybackPlayer,
            PlaybackPlayerArgs,
            StatusUrl,
            StatusInterval,
            LoggingLevel,
            LoggingDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ManifestUrl => "manifest.url",
            ManifestApiKey => "manifest.api_key",
            ManifestTimeout => "manifest.timeout",
            ManifestPollInterval => "manifest.poll_interval",
            ManifestRetryDelay => "manifest.retry_delay",
            ManifestFallbackUrl => "manifest.fallback_url",
            DeviceId => "device.id",
            DeviceName => "device.name",
            CacheDirectory => "cache.directory",
            CachePruneStale => "cache.prune_stale",
            DownloadParallel => "download.parallel",
            DownloadTimeout => "download.timeout",
            PlaybackMaxRetries => "playback.max_retries",
            PlaybackRetryDelay => "playback.retry_delay",
            PlaybackStallTimeout => "playback.stall_timeout",
            PlaybackPlayer => "playback.player",
            PlaybackPlayerArgs => "playback.player_args",
            StatusUrl => "status.url",
            StatusInterval => "status.interval",
            LoggingLevel => "logging.level",
            LoggingDirectory => "logging.directory",
        }
    }

    /// INI section this key lives in.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or((name, ""))
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        let optional = |v: &Option<String>| v.clone().unwrap_or_default();
        match self {
            ManifestUrl => optional(&config.manifest.url),
            ManifestApiKey => optional(&config.manifest.api_key),
            ManifestTimeout => config.manifest.timeout_secs.to_string(),
            ManifestPollInterval => config.manifest.poll_interval_secs.to_string(),
            ManifestRetryDelay => config.manifest.retry_delay_secs.to_string(),
            ManifestFallbackUrl => optional(&config.manifest.fallback_url),
            DeviceId => config.device.id.clone(),
            DeviceName => optional(&config.device.name),
            CacheDirectory => config.cache.directory.display().to_string(),
            CachePruneStale => config.cache.prune_stale.to_string(),
            DownloadParallel => config.download.parallel.to_string(),
            DownloadTimeout => config.download.timeout_secs.to_string(),
            PlaybackMaxRetries => config.playback.max_retries.to_string(),
            PlaybackRetryDelay => config.playback.retry_delay_ms.to_string(),
            PlaybackStallTimeout => config.playback.stall_timeout_secs.to_string(),
            PlaybackPlayer => config.playback.player.clone(),
            PlaybackPlayerArgs => config.playback.player_args.clone(),
            StatusUrl => optional(&config.status.url),
            StatusInterval => config.status.interval_secs.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validates `value` and stores it.
    ///
    /// An empty value clears optional keys and is rejected for the rest.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            ManifestUrl => config.manifest.url = self.url(value)?,
            ManifestApiKey => config.manifest.api_key = optional(value),
            ManifestTimeout => config.manifest.timeout_secs = self.positive(value)?,
            ManifestPollInterval => config.manifest.poll_interval_secs = self.positive(value)?,
            ManifestRetryDelay => config.manifest.retry_delay_secs = self.positive(value)?,
            ManifestFallbackUrl => config.manifest.fallback_url = optional(value),
            DeviceId => config.device.id = self.required(value)?,
            DeviceName => config.device.name = optional(value),
            CacheDirectory => config.cache.directory = PathBuf::from(self.required(value)?),
            CachePruneStale => config.cache.prune_stale = self.boolean(value)?,
            DownloadParallel => config.download.parallel = self.positive(value)?,
            DownloadTimeout => config.download.timeout_secs = self.positive(value)?,
            PlaybackMaxRetries => config.playback.max_retries = self.number(value)?,
            PlaybackRetryDelay => config.playback.retry_delay_ms = self.number(value)?,
            PlaybackStallTimeout => config.playback.stall_timeout_secs = self.positive(value)?,
            PlaybackPlayer => config.playback.player = self.required(value)?,
            PlaybackPlayerArgs => config.playback.player_args = value.to_string(),
            StatusUrl => config.status.url = self.url(value)?,
            StatusInterval => config.status.interval_secs = self.positive(value)?,
            LoggingLevel => config.logging.level = self.level(value)?,
            LoggingDirectory => config.logging.directory = optional(value).map(PathBuf::from),
        }
        Ok(())
    }

    fn required(&self, value: &str) -> Result<String, ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::invalid(self.name(), value, "value must not be empty"));
        }
        Ok(value.to_string())
    }

    fn number<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value
            .parse()
            .map_err(|_| ConfigError::invalid(self.name(), value, "expected a whole number"))
    }

    fn positive<T: FromStr + PartialOrd + Default>(&self, value: &str) -> Result<T, ConfigError> {
        let n: T = self.number(value)?;
        if n <= T::default() {
            return Err(ConfigError::invalid(self.name(), value, "must be greater than zero"));
        }
        Ok(n)
    }

    fn boolean(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ConfigError::invalid(self.name(), value, "expected true or false")),
        }
    }

    fn url(&self, value: &str) -> Result<Option<String>, ConfigError> {
        if value.is_empty() {
            return Ok(None);
        }
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err(ConfigError::invalid(
                self.name(),
                value,
                "expected an http:// or https:// URL",
            ));
        }
        Ok(Some(value.to_string()))
    }

    fn level(&self, value: &str) -> Result<String, ConfigError> {
        let lower = value.to_ascii_lowercase();
        if LOG_LEVELS.contains(&lower.as_str()) {
            Ok(lower)
        } else {
            Err(ConfigError::invalid(
                self.name(),
                value,
                format!("expected one of {}", LOG_LEVELS.join(", ")),
            ))
        }
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_parses_back() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
            assert_eq!(
                format!("{}.{}", key.section(), key.key_name()),
                key.name()
            );
        }
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(
            "manifest.colour".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_then_get() {
        let mut config = ConfigFile::default();
        ConfigKey::ManifestUrl
            .set(&mut config, "https://signage.test/api/content.php")
            .unwrap();
        ConfigKey::DownloadParallel.set(&mut config, "4").unwrap();
        ConfigKey::LoggingLevel.set(&mut config, "DEBUG").unwrap();

        assert_eq!(
            ConfigKey::ManifestUrl.get(&config),
            "https://signage.test/api/content.php"
        );
        assert_eq!(config.download.parallel, 4);
        assert_eq!(ConfigKey::LoggingLevel.get(&config), "debug");
    }

    #[test]
    fn test_empty_clears_optional() {
        let mut config = ConfigFile::default();
        ConfigKey::ManifestApiKey.set(&mut config, "secret").unwrap();
        ConfigKey::ManifestApiKey.set(&mut config, "").unwrap();
        assert!(config.manifest.api_key.is_none());
        assert_eq!(ConfigKey::ManifestApiKey.get(&config), "");
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::DownloadParallel.set(&mut config, "0").is_err());
        assert!(ConfigKey::ManifestTimeout.set(&mut config, "-5").is_err());
        assert!(ConfigKey::CachePruneStale.set(&mut config, "maybe").is_err());
        assert!(ConfigKey::ManifestUrl.set(&mut config, "ftp://x").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());
        assert!(ConfigKey::DeviceId.set(&mut config, "").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_zero_retries_allowed() {
        let mut config = ConfigFile::default();
        ConfigKey::PlaybackMaxRetries.set(&mut config, "0").unwrap();
        assert_eq!(config.playback.max_retries, 0);
    }
}
