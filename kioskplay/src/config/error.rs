//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading, editing or saving the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Reading or writing the config file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// A key required for this operation is not set.
    #[error("{0} is not set; run 'kioskplay init <manifest-url>' or 'kioskplay config set {0} <value>'")]
    MissingValue(String),

    /// The key is not a known `section.key` name.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
