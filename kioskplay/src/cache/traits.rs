//! Core trait for local video caches.
//!
//! The `LocalCache` trait is the storage boundary of the sync engine. It is
//! keyed by playlist filename and stores whole video files.
//!
//! # Design Principles
//!
//! - **Filename keys**: the manifest filename is the identity of a video
//! - **Write then verify**: `save` persists bytes, `verify` proves the stored
//!   copy is non-empty and looks like a playable container
//! - **No partial files**: a save interrupted midway never shows up in
//!   `exists` or `list`
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` so the engine can hold
//!   an `Arc<dyn LocalCache>`

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use super::probe::Container;
use crate::http::BoxFuture;
use crate::manifest::LocalRef;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The filename cannot be stored (path separators, hidden, empty).
    #[error("invalid cache filename: {0:?}")]
    InvalidFilename(String),

    /// The stored copy failed verification.
    #[error("verification of {filename} failed: {reason}")]
    VerificationFailed { filename: String, reason: String },

    /// The requested file is not cached.
    #[error("{0} is not cached")]
    NotFound(String),
}

/// A verified cached copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedVideo {
    /// Where the copy lives.
    pub local_ref: LocalRef,
    /// Stored size in bytes.
    pub size_bytes: u64,
    /// Container detected by the probe.
    pub container: Container,
}

/// Number of files and total bytes held by a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub files: u64,
    pub bytes: u64,
}

impl fmt::Display for CacheUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} files, {} bytes", self.files, self.bytes)
    }
}

/// Local store of downloaded videos.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; the sync engine issues
/// concurrent operations for different filenames.
pub trait LocalCache: Send + Sync {
    /// Check whether a complete copy of `filename` is stored.
    fn exists(&self, filename: &str) -> BoxFuture<'_, CacheResult<bool>>;

    /// Store `data` as `filename`, replacing any previous copy.
    ///
    /// The write is atomic with respect to `exists` and `list`: readers see
    /// either the previous copy or the new one, never a partial file.
    fn save(&self, filename: &str, data: Bytes) -> BoxFuture<'_, CacheResult<LocalRef>>;

    /// Verify the stored copy of `filename`.
    ///
    /// Checks the copy is non-empty and that its header matches a known video
    /// container.
    fn verify(&self, filename: &str) -> BoxFuture<'_, CacheResult<CachedVideo>>;

    /// List stored filenames in lexical order.
    fn list(&self) -> BoxFuture<'_, CacheResult<Vec<String>>>;

    /// Delete the stored copy of `filename`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if a copy existed and was deleted
    /// - `Ok(false)` if nothing was stored under that name
    fn remove(&self, filename: &str) -> BoxFuture<'_, CacheResult<bool>>;

    /// Number of stored files and their total size.
    fn usage(&self) -> BoxFuture<'_, CacheResult<CacheUsage>>;

    /// Short backend name for logs ("disk", "memory").
    fn name(&self) -> &str;
}

/// Rejects filenames that cannot be stored safely.
pub(crate) fn check_filename(filename: &str) -> CacheResult<()> {
    if crate::manifest::is_valid_filename(filename) {
        Ok(())
    } else {
        Err(CacheError::InvalidFilename(filename.to_string()))
    }
}
