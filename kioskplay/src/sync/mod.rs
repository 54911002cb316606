//! Playlist synchronization.
//!
//! ```text
//!  SyncScheduler ──poll()──► SyncEngine ──fetch──► ManifestSource
//!                               │
//!                               ├──acquire──► Downloader ──► LocalCache
//!                               │
//!                               └──publish──► watch<Arc<Playlist>>
//! ```
//!
//! # Example
//!
//! ```ignore
//! let engine = Arc::new(SyncEngine::new(source, cache, downloader, SyncConfig::default()));
//! let playlist_rx = engine.subscribe();
//! tokio::spawn(SyncScheduler::new(engine.clone()).run(shutdown.clone()));
//! ```

mod config;
mod download;
mod engine;
mod error;
mod scheduler;
mod stats;

pub use config::{
    clamp_poll_interval, DownloadConfig, SyncConfig, DEFAULT_DOWNLOAD_PARALLEL,
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS,
    MIN_POLL_INTERVAL_SECS,
};
pub use download::{Acquired, Downloader};
pub use engine::{PollOutcome, SyncEngine, SyncReport};
pub use error::{DownloadError, ErrorKind, SyncError, SyncResult};
pub use scheduler::SyncScheduler;
pub use stats::{SyncStats, SyncStatsSnapshot};
