//! kioskplay - unattended digital-signage playback
//!
//! This library keeps a kiosk display playing a remotely managed playlist.
//! A [`sync::SyncEngine`] reconciles the remote manifest against a local
//! video cache and publishes immutable playlist snapshots; a
//! [`playback::PlaybackLoop`] drives a single output sink through the
//! published playlist, retrying and skipping videos that fail to play.
//!
//! ```text
//! Manifest endpoint ──► SyncEngine ──► LocalCache
//!                           │
//!                           │ watch<Arc<Playlist>>
//!                           ▼
//!                     PlaybackDriver ──► PlaybackLoop ──► OutputSink
//!                           │
//!                           └──► StatusReporter ──► status endpoint
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod http;
pub mod logging;
pub mod manifest;
pub mod playback;
pub mod retry;
pub mod status;
pub mod sync;

/// Crate version, reported in the `User-Agent` header and status reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every HTTP request.
pub fn user_agent() -> String {
    format!("kioskplay/{}", VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version() {
        let agent = user_agent();
        assert!(agent.starts_with("kioskplay/"));
        assert!(agent.ends_with(VERSION));
    }
}
