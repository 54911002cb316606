//! Error types for the sync engine.

use std::fmt;

use thiserror::Error;

use crate::cache::CacheError;
use crate::http::HttpError;
use crate::manifest::ManifestError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Why a poll did not apply a new playlist.
///
/// None of these are fatal: the scheduler logs them and polls again after
/// the retry delay. The current playlist is always left untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    /// Network failure, timeout, non-success status or unparseable body.
    #[error(transparent)]
    ManifestUnavailable(#[from] ManifestError),

    /// The manifest parsed but listed no playable videos.
    #[error("manifest from {url} lists no playable videos")]
    EmptyManifest { url: String },

    /// Shutdown was requested while the poll was in flight.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Taxonomy name used in logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::ManifestUnavailable(_) => ErrorKind::ManifestUnavailable,
            SyncError::EmptyManifest { .. } => ErrorKind::EmptyManifest,
            SyncError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Failure to bring one video into the local cache.
///
/// Never fails a poll: the entry falls back to its remote URL.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download of {filename} failed: {source}")]
    Fetch {
        filename: String,
        #[source]
        source: HttpError,
    },

    #[error("download of {filename} timed out after {timeout_secs}s")]
    Timeout { filename: String, timeout_secs: u64 },

    #[error("caching {filename} failed: {source}")]
    Cache {
        filename: String,
        #[source]
        source: CacheError,
    },

    #[error("download of {filename} cancelled")]
    Cancelled { filename: String },
}

impl DownloadError {
    pub fn filename(&self) -> &str {
        match self {
            DownloadError::Fetch { filename, .. }
            | DownloadError::Timeout { filename, .. }
            | DownloadError::Cache { filename, .. }
            | DownloadError::Cancelled { filename } => filename,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::Cancelled { .. } => ErrorKind::Cancelled,
            _ => ErrorKind::DownloadFailed,
        }
    }
}

/// Error taxonomy shared across the crate's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ManifestUnavailable,
    EmptyManifest,
    DownloadFailed,
    PlaybackStalled,
    InvalidPlaylist,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ManifestUnavailable => "ManifestUnavailable",
            ErrorKind::EmptyManifest => "EmptyManifest",
            ErrorKind::DownloadFailed => "DownloadFailed",
            ErrorKind::PlaybackStalled => "PlaybackStalled",
            ErrorKind::InvalidPlaylist => "InvalidPlaylist",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}
