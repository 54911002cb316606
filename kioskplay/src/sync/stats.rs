//! Sync counters.
//!
//! Lock-free counters updated by the engine, read as a point-in-time
//! [`SyncStatsSnapshot`] by the CLI and the status reporter.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic sync counters.
#[derive(Debug, Default)]
pub struct SyncStats {
    polls: AtomicU64,
    applied: AtomicU64,
    unchanged: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    downloads: AtomicU64,
    download_bytes: AtomicU64,
    download_fallbacks: AtomicU64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn poll_started(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_failed(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn download_completed(&self, bytes: u64) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.download_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn download_fell_back(&self) {
        self.download_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of the counters.
    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            download_bytes: self.download_bytes.load(Ordering::Relaxed),
            download_fallbacks: self.download_fallbacks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    /// Polls that ran (including ones that failed).
    pub polls: u64,
    /// Polls that published a new playlist.
    pub applied: u64,
    /// Polls that found the applied version unchanged.
    pub unchanged: u64,
    /// Polls skipped because another was in flight.
    pub skipped: u64,
    /// Polls that ended in an error.
    pub failures: u64,
    /// Videos downloaded and verified.
    pub downloads: u64,
    /// Bytes downloaded.
    pub download_bytes: u64,
    /// Entries that fell back to their remote URL.
    pub download_fallbacks: u64,
}

impl fmt::Display for SyncStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "polls={} applied={} unchanged={} skipped={} failures={} downloads={} ({} bytes) fallbacks={}",
            self.polls,
            self.applied,
            self.unchanged,
            self.skipped,
            self.failures,
            self.downloads,
            self.download_bytes,
            self.download_fallbacks
        )
    }
}
