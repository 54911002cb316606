//! The playback state machine.
//!
//! [`PlaybackLoop::handle`] is the single transition function. It takes one
//! [`PlayerEvent`], drives the sink, and tells the caller what to do with
//! its one pending timer. It never sleeps and never blocks, so tests feed it
//! events directly with a fake sink.
//!
//! ```text
//!            playlist                started               ended
//!   Idle ──────────────► Loading ─────────────► Playing ─────────► Advancing
//!    ▲                     ▲  │                   │                   │
//!    │ empty playlist      │  │ error / timeout   │ error / stall     │
//!    │                     │  ▼                   ▼                   │
//!    │                   Stalled ◄────────────────┘                   │
//!    │                     │ retries exhausted                        │
//!    │                     └──────────────────────────────► Advancing │
//!    │                                                                │
//!    └──────────────── (index + 1) mod len ◄──────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::PlaybackConfig;
use super::sink::{OutputSink, SinkError};
use super::state::{
    LoadId, PlaybackCursor, PlaybackState, PlaybackStatus, PlayerEvent, SinkEvent,
    SinkEventKind, TimerCommand, TimerKind,
};
use crate::manifest::{PlaybackSource, Playlist};
use crate::sync::ErrorKind;

/// Delay before retrying when no entry of the playlist could be loaded.
const MIN_RECOVERY_DELAY: Duration = Duration::from_secs(1);

/// Drives a single output sink through the published playlist.
pub struct PlaybackLoop {
    sink: Box<dyn OutputSink>,
    config: PlaybackConfig,
    playlist: Arc<Playlist>,
    cursor: PlaybackCursor,
    state: PlaybackState,
    /// Filename of the video the loop is on.
    current: Option<String>,
    current_cached: bool,
    /// Load the sink currently holds; `None` once released.
    active_load: Option<LoadId>,
    next_load: LoadId,
    /// Index to play after the current video, when the current video has
    /// left the playlist.
    next_override: Option<usize>,
    buffering: bool,
    status_tx: watch::Sender<PlaybackStatus>,
}

impl PlaybackLoop {
    /// Creates an idle loop with an empty playlist.
    pub fn new(sink: Box<dyn OutputSink>, config: PlaybackConfig) -> Self {
        let (status_tx, _) = watch::channel(PlaybackStatus::default());
        Self {
            sink,
            config,
            playlist: Arc::new(Playlist::empty()),
            cursor: PlaybackCursor::new(),
            state: PlaybackState::Idle,
            current: None,
            current_cached: false,
            active_load: None,
            next_load: LoadId::new(1),
            next_override: None,
            buffering: false,
            status_tx,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    pub fn playlist(&self) -> &Arc<Playlist> {
        &self.playlist
    }

    /// Load whose sink events are currently accepted.
    pub fn current_load(&self) -> Option<LoadId> {
        self.active_load
    }

    /// Filename of the video the loop is on.
    pub fn current_video(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Receiver of status updates.
    pub fn status_receiver(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status_tx.borrow().clone()
    }

    /// Feeds a sink event, ignoring events from released loads.
    pub fn handle_sink_event(&mut self, event: SinkEvent) -> TimerCommand {
        if self.active_load != Some(event.load_id) {
            debug!(load = %event.load_id, event = ?event.kind, "Ignoring stale sink event");
            return TimerCommand::Keep;
        }
        self.handle(PlayerEvent::Sink(event.kind))
    }

    /// The transition function.
    pub fn handle(&mut self, event: PlayerEvent) -> TimerCommand {
        let command = match event {
            PlayerEvent::PlaylistUpdated(playlist) => self.on_playlist(playlist),
            PlayerEvent::Sink(kind) => self.on_sink(kind),
            PlayerEvent::RetryElapsed => self.on_retry_elapsed(),
            PlayerEvent::StallTimeout => self.on_stall_timeout(),
        };
        self.publish_status();
        command
    }

    /// Moves to `(current_index + 1) mod len` and loads it.
    pub fn play_next(&mut self) -> TimerCommand {
        let command = self.advance();
        self.publish_status();
        command
    }

    /// Releases the sink and returns to `Idle`.
    pub fn stop(&mut self) {
        self.go_idle();
        self.publish_status();
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn on_playlist(&mut self, playlist: Arc<Playlist>) -> TimerCommand {
        if Arc::ptr_eq(&playlist, &self.playlist) {
            return TimerCommand::Keep;
        }
        self.playlist = playlist;
        let len = self.playlist.len();

        if len == 0 {
            if self.state != PlaybackState::Idle {
                info!("Playlist is empty, pausing playback");
            }
            self.go_idle();
            return TimerCommand::Clear;
        }

        let relocated = self
            .current
            .as_deref()
            .and_then(|name| self.playlist.position(name));
        debug!(entries = len, relocated = ?relocated, "Playlist updated");

        match (self.state, relocated) {
            (PlaybackState::Idle, _) => {
                self.cursor.clamp(len);
                self.cursor.retry_count = 0;
                info!(entries = len, "Starting playback");
                self.load_current()
            }
            (_, Some(index)) => {
                // Keep playing; the next advance continues from the new position.
                self.cursor.current_index = index;
                self.next_override = None;
                TimerCommand::Keep
            }
            (PlaybackState::Stalled, None) => {
                self.cursor.clamp(len);
                self.cursor.retry_count = 0;
                self.next_override = None;
                self.load_current()
            }
            (_, None) => {
                // The current video left the playlist. Let it finish, then
                // continue with whatever now occupies its index.
                self.cursor.clamp(len);
                self.next_override = Some(self.cursor.current_index);
                TimerCommand::Keep
            }
        }
    }

    fn on_sink(&mut self, kind: SinkEventKind) -> TimerCommand {
        use PlaybackState::{Loading, Playing};

        match (self.state, kind) {
            (Loading, SinkEventKind::Started) => {
                self.state = Playing;
                self.cursor.retry_count = 0;
                self.buffering = false;
                info!(
                    filename = self.current.as_deref().unwrap_or_default(),
                    index = self.cursor.current_index,
                    cached = self.current_cached,
                    "Playing"
                );
                self.prefetch_next();
                TimerCommand::Clear
            }
            (Playing, SinkEventKind::Progress) if self.buffering => {
                self.buffering = false;
                TimerCommand::Clear
            }
            (Playing, SinkEventKind::Buffering) if !self.buffering => {
                self.buffering = true;
                TimerCommand::Arm(TimerKind::Stall, self.config.stall_timeout)
            }
            (Loading | Playing, SinkEventKind::Ended) => self.advance(),
            (Loading | Playing, SinkEventKind::Stalled) => self.stall("sink stalled"),
            (Loading | Playing, SinkEventKind::Errored(reason)) => self.stall(&reason),
            (state, kind) => {
                debug!(state = %state, event = ?kind, "Sink event has no effect");
                TimerCommand::Keep
            }
        }
    }

    fn on_retry_elapsed(&mut self) -> TimerCommand {
        if self.state == PlaybackState::Stalled {
            debug!(
                index = self.cursor.current_index,
                retry = self.cursor.retry_count,
                "Retrying video"
            );
            self.load_current()
        } else {
            TimerCommand::Keep
        }
    }

    fn on_stall_timeout(&mut self) -> TimerCommand {
        match self.state {
            PlaybackState::Loading | PlaybackState::Playing => {
                let reason = format!(
                    "no progress for {}s",
                    self.config.stall_timeout.as_secs_f32()
                );
                self.stall(&reason)
            }
            _ => TimerCommand::Keep,
        }
    }

    /// Retries the current index, or skips it once retries are exhausted.
    fn stall(&mut self, reason: &str) -> TimerCommand {
        self.release_sink();
        self.state = PlaybackState::Stalled;
        self.buffering = false;

        let retry = self.cursor.retry_count + 1;
        match self.config.retry_policy.delay_for_retry(retry) {
            Some(delay) => {
                self.cursor.retry_count = retry;
                warn!(
                    kind = %ErrorKind::PlaybackStalled,
                    filename = self.current.as_deref().unwrap_or_default(),
                    reason,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Playback stalled, retrying"
                );
                TimerCommand::Arm(TimerKind::Retry, delay)
            }
            None => {
                warn!(
                    kind = %ErrorKind::PlaybackStalled,
                    filename = self.current.as_deref().unwrap_or_default(),
                    reason,
                    "Retries exhausted, skipping video"
                );
                self.advance()
            }
        }
    }

    fn advance(&mut self) -> TimerCommand {
        let len = self.playlist.len();
        if len == 0 {
            self.go_idle();
            return TimerCommand::Clear;
        }
        self.state = PlaybackState::Advancing;
        let target = self
            .next_override
            .take()
            .unwrap_or(self.cursor.current_index + 1);
        self.cursor.jump(target, len);
        self.load_current()
    }

    /// Loads the entry at the cursor, moving past entries the sink rejects.
    fn load_current(&mut self) -> TimerCommand {
        let playlist = Arc::clone(&self.playlist);
        let len = playlist.len();
        if len == 0 {
            self.go_idle();
            return TimerCommand::Clear;
        }

        for _ in 0..len {
            self.cursor.clamp(len);
            let index = self.cursor.current_index;
            let Some(video) = playlist.get(index) else {
                break;
            };

            self.release_sink();
            let load_id = self.next_load;
            self.next_load = load_id.next();
            self.state = PlaybackState::Loading;
            self.buffering = false;
            self.current = Some(video.filename.clone());

            let source = video.playback_source();
            let loaded = match self.sink.load(load_id, &source) {
                // A sink that cannot read the cache still plays the remote copy.
                Err(SinkError::Unsupported(location)) if source.is_cached() => {
                    debug!(
                        filename = %video.filename,
                        location = %location,
                        "Sink cannot play cached copy, streaming from source"
                    );
                    self.sink
                        .load(load_id, &PlaybackSource::Remote(&video.source_url))
                        .map(|()| false)
                }
                other => other.map(|()| source.is_cached()),
            };
            match loaded {
                Ok(cached) => {
                    self.active_load = Some(load_id);
                    self.current_cached = cached;
                    info!(
                        filename = %video.filename,
                        index,
                        cached = self.current_cached,
                        load = %load_id,
                        "Loading video"
                    );
                    return TimerCommand::Arm(TimerKind::Stall, self.config.stall_timeout);
                }
                Err(e) => {
                    warn!(
                        filename = %video.filename,
                        sink = self.sink.name(),
                        error = %e,
                        "Sink rejected video, skipping"
                    );
                    self.cursor.current_index = (index + 1) % len;
                    self.cursor.retry_count = 0;
                }
            }
        }

        let delay = self.config.retry_policy.base_delay().max(MIN_RECOVERY_DELAY);
        warn!(
            kind = %ErrorKind::InvalidPlaylist,
            entries = len,
            retry_in_ms = delay.as_millis() as u64,
            "No entry of the playlist could be loaded"
        );
        self.state = PlaybackState::Stalled;
        self.current = None;
        TimerCommand::Arm(TimerKind::Retry, delay)
    }

    fn prefetch_next(&mut self) {
        if !self.config.prefetch_next || self.playlist.len() < 2 {
            return;
        }
        let target = self
            .next_override
            .unwrap_or(self.cursor.current_index + 1);
        let playlist = Arc::clone(&self.playlist);
        if let Some(next) = playlist.wrap_index(target).and_then(|i| playlist.get(i)) {
            self.sink.preload(&next.playback_source());
        }
    }

    fn go_idle(&mut self) {
        self.release_sink();
        self.state = PlaybackState::Idle;
        self.current = None;
        self.current_cached = false;
        self.next_override = None;
        self.buffering = false;
        self.cursor.retry_count = 0;
    }

    fn release_sink(&mut self) {
        if self.active_load.take().is_some() {
            self.sink.release();
        }
    }

    fn publish_status(&self) {
        let status = PlaybackStatus {
            state: self.state,
            current_video: self.current.clone(),
            index: self.current.as_ref().map(|_| self.cursor.current_index),
            retry_count: self.cursor.retry_count,
            playlist_len: self.playlist.len(),
            cached: self.current_cached,
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

impl Drop for PlaybackLoop {
    fn drop(&mut self) {
        self.release_sink();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{LocalRef, VideoDescriptor};
    use crate::playback::sink::tests::RecordingSink;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn url(name: &str) -> String {
        format!("http://signage.test/videos/{}", name)
    }

    fn playlist(names: &[&str]) -> Arc<Playlist> {
        Arc::new(Playlist::new(
            names
                .iter()
                .map(|n| VideoDescriptor::new(*n, url(n), "video/mp4"))
                .collect(),
        ))
    }

    fn machine(sink: &RecordingSink) -> PlaybackLoop {
        PlaybackLoop::new(Box::new(sink.clone()), PlaybackConfig::default())
    }

    fn started(m: &mut PlaybackLoop) -> TimerCommand {
        m.handle(PlayerEvent::Sink(SinkEventKind::Started))
    }

    #[test]
    fn test_idle_until_first_playlist() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        assert_eq!(m.state(), PlaybackState::Idle);

        let command = m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        assert_eq!(
            command,
            TimerCommand::Arm(TimerKind::Stall, Duration::from_secs(5))
        );
        assert_eq!(m.state(), PlaybackState::Loading);
        assert_eq!(sink.loaded_locations(), vec![url("a.mp4")]);

        assert_eq!(started(&mut m), TimerCommand::Clear);
        assert_eq!(m.state(), PlaybackState::Playing);
        assert_eq!(m.status().current_video.as_deref(), Some("a.mp4"));
    }

    #[test]
    fn test_empty_playlist_stays_idle() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&[])));
        assert_eq!(m.state(), PlaybackState::Idle);
        assert!(sink.loaded_locations().is_empty());
    }

    #[test]
    fn test_ring_advance_visits_every_index() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4", "c.mp4"])));
        assert_eq!(m.cursor().current_index, 0);

        let visited: Vec<usize> = (0..7)
            .map(|_| {
                m.play_next();
                m.cursor().current_index
            })
            .collect();
        assert_eq!(visited, vec![1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_natural_end_advances() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        started(&mut m);

        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        assert_eq!(m.state(), PlaybackState::Loading);
        assert_eq!(m.cursor().current_index, 1);
        assert_eq!(sink.loaded_locations(), vec![url("a.mp4"), url("b.mp4")]);
    }

    #[test]
    fn test_bounded_retry_then_skip() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));

        for retry in 1..=3u32 {
            let command = m.handle(PlayerEvent::Sink(SinkEventKind::Errored("decode".into())));
            assert_eq!(
                command,
                TimerCommand::Arm(TimerKind::Retry, Duration::from_secs(retry as u64))
            );
            assert_eq!(m.state(), PlaybackState::Stalled);
            assert_eq!(m.cursor().retry_count, retry);
            assert_eq!(m.cursor().current_index, 0);

            m.handle(PlayerEvent::RetryElapsed);
            assert_eq!(m.state(), PlaybackState::Loading);
        }

        m.handle(PlayerEvent::Sink(SinkEventKind::Errored("decode".into())));
        assert_eq!(m.cursor().current_index, 1);
        assert_eq!(m.cursor().retry_count, 0);
        assert_eq!(m.state(), PlaybackState::Loading);
        assert_eq!(
            sink.loaded_locations(),
            vec![url("a.mp4"), url("a.mp4"), url("a.mp4"), url("a.mp4"), url("b.mp4")]
        );
    }

    #[test]
    fn test_successful_start_resets_retries() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        m.handle(PlayerEvent::Sink(SinkEventKind::Stalled));
        m.handle(PlayerEvent::RetryElapsed);
        assert_eq!(m.cursor().retry_count, 1);

        started(&mut m);
        assert_eq!(m.cursor().retry_count, 0);
    }

    #[test]
    fn test_buffering_without_progress_stalls() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4"])));
        started(&mut m);

        let command = m.handle(PlayerEvent::Sink(SinkEventKind::Buffering));
        assert_eq!(
            command,
            TimerCommand::Arm(TimerKind::Stall, Duration::from_secs(5))
        );
        assert_eq!(
            m.handle(PlayerEvent::Sink(SinkEventKind::Progress)),
            TimerCommand::Clear
        );

        m.handle(PlayerEvent::Sink(SinkEventKind::Buffering));
        let command = m.handle(PlayerEvent::StallTimeout);
        assert_eq!(m.state(), PlaybackState::Stalled);
        assert_eq!(
            command,
            TimerCommand::Arm(TimerKind::Retry, Duration::from_secs(1))
        );
    }

    #[test]
    fn test_loading_timeout_stalls() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4"])));
        m.handle(PlayerEvent::StallTimeout);
        assert_eq!(m.state(), PlaybackState::Stalled);
    }

    #[test]
    fn test_stale_sink_events_are_ignored() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        let first = m.current_load().unwrap();
        m.handle_sink_event(SinkEvent::new(first, SinkEventKind::Started));
        m.handle_sink_event(SinkEvent::new(first, SinkEventKind::Ended));
        let second = m.current_load().unwrap();
        assert_ne!(first, second);

        // A late exit report from the first player must not skip b.mp4.
        let command = m.handle_sink_event(SinkEvent::new(first, SinkEventKind::Ended));
        assert_eq!(command, TimerCommand::Keep);
        assert_eq!(m.cursor().current_index, 1);
        assert_eq!(m.state(), PlaybackState::Loading);
    }

    #[test]
    fn test_cache_preferred_over_remote() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        let local = LocalRef::File(PathBuf::from("/var/lib/kioskplay/videos/a.mp4"));
        let cached = VideoDescriptor::new("a.mp4", url("a.mp4"), "video/mp4").with_local_ref(local);
        m.handle(PlayerEvent::PlaylistUpdated(Arc::new(Playlist::new(vec![cached]))));

        assert_eq!(
            sink.loaded_locations(),
            vec!["/var/lib/kioskplay/videos/a.mp4".to_string()]
        );
        started(&mut m);
        assert!(m.status().cached);
    }

    #[test]
    fn test_unplayable_cached_copy_streams_from_source() {
        let sink = RecordingSink::new();
        sink.fail_on("memory://a.mp4");
        let mut m = machine(&sink);
        let cached = VideoDescriptor::new("a.mp4", url("a.mp4"), "video/mp4")
            .with_local_ref(LocalRef::Memory("a.mp4".to_string()));
        let other = VideoDescriptor::new("b.mp4", url("b.mp4"), "video/mp4");
        let command = m.handle(PlayerEvent::PlaylistUpdated(Arc::new(Playlist::new(vec![
            cached, other,
        ]))));

        assert_eq!(
            command,
            TimerCommand::Arm(TimerKind::Stall, Duration::from_secs(5))
        );
        assert_eq!(
            sink.loaded_locations(),
            vec!["memory://a.mp4".to_string(), url("a.mp4")]
        );
        assert_eq!(m.state(), PlaybackState::Loading);
        assert_eq!(m.current_video(), Some("a.mp4"));

        started(&mut m);
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!(!m.status().cached);
        assert_eq!(sink.log.lock().max_outstanding, 1);
    }

    #[test]
    fn test_update_mid_playback_does_not_restart() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        started(&mut m);

        let command = m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "c.mp4"])));
        assert_eq!(command, TimerCommand::Keep);
        assert_eq!(m.state(), PlaybackState::Playing);
        assert_eq!(sink.loaded_locations().len(), 1);

        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        assert_eq!(sink.loaded_locations(), vec![url("a.mp4"), url("c.mp4")]);
    }

    #[test]
    fn test_update_relocates_current_video() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4", "c.mp4"])));
        started(&mut m);
        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        started(&mut m);
        assert_eq!(m.current_video(), Some("b.mp4"));

        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["new.mp4", "b.mp4", "x.mp4", "y.mp4"])));
        assert_eq!(m.cursor().current_index, 1);
        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        assert_eq!(m.current_video(), Some("x.mp4"));
    }

    #[test]
    fn test_removed_current_video_finishes_then_continues_at_index() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4", "c.mp4"])));
        started(&mut m);
        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        started(&mut m);

        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "c.mp4"])));
        assert_eq!(m.state(), PlaybackState::Playing);
        assert_eq!(m.current_video(), Some("b.mp4"));

        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        assert_eq!(m.current_video(), Some("c.mp4"));
        assert_eq!(m.cursor().current_index, 1);
    }

    #[test]
    fn test_out_of_range_index_is_clamped() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4", "c.mp4", "d.mp4"])));
        for _ in 0..3 {
            m.play_next();
        }
        started(&mut m);
        assert_eq!(m.cursor().current_index, 3);

        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["x.mp4", "y.mp4"])));
        assert!(m.cursor().current_index < 2);
        m.handle(PlayerEvent::Sink(SinkEventKind::Ended));
        assert_eq!(m.current_video(), Some("y.mp4"));
    }

    #[test]
    fn test_empty_playlist_while_running_pauses_in_idle() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4"])));
        started(&mut m);

        let command = m.handle(PlayerEvent::PlaylistUpdated(playlist(&[])));
        assert_eq!(command, TimerCommand::Clear);
        assert_eq!(m.state(), PlaybackState::Idle);
        assert_eq!(sink.log.lock().outstanding, 0);
        assert_eq!(m.status().current_video, None);

        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["b.mp4"])));
        assert_eq!(m.state(), PlaybackState::Loading);
        assert_eq!(m.current_video(), Some("b.mp4"));
    }

    #[test]
    fn test_rejected_loads_skip_to_next_entry() {
        let sink = RecordingSink::new();
        sink.fail_on(&url("a.mp4"));
        let mut m = machine(&sink);

        let command = m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        assert!(matches!(command, TimerCommand::Arm(TimerKind::Stall, _)));
        assert_eq!(m.current_video(), Some("b.mp4"));
    }

    #[test]
    fn test_all_loads_rejected_waits_then_retries() {
        let sink = RecordingSink::new();
        sink.fail_on(&url("a.mp4"));
        sink.fail_on(&url("b.mp4"));
        let mut m = machine(&sink);

        let command = m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        assert_eq!(
            command,
            TimerCommand::Arm(TimerKind::Retry, Duration::from_secs(1))
        );
        assert_eq!(m.state(), PlaybackState::Stalled);
        assert_eq!(sink.loaded_locations().len(), 2);

        sink.fail_locations.lock().clear();
        m.handle(PlayerEvent::RetryElapsed);
        assert_eq!(m.state(), PlaybackState::Loading);
    }

    #[test]
    fn test_prefetch_hints_next_entry() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4"])));
        started(&mut m);
        assert_eq!(sink.log.lock().preloads, vec![url("b.mp4")]);
    }

    #[test]
    fn test_resources_bounded_over_many_swaps() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4", "b.mp4", "c.mp4"])));
        for _ in 0..1000 {
            m.play_next();
        }

        let log = sink.log.lock();
        assert_eq!(log.loads.len(), 1001);
        assert_eq!(log.releases, 1000);
        assert_eq!(log.outstanding, 1);
        assert_eq!(log.max_outstanding, 1);
    }

    #[test]
    fn test_stop_releases_sink() {
        let sink = RecordingSink::new();
        let mut m = machine(&sink);
        m.handle(PlayerEvent::PlaylistUpdated(playlist(&["a.mp4"])));
        m.stop();
        assert_eq!(m.state(), PlaybackState::Idle);
        assert_eq!(sink.log.lock().outstanding, 0);
    }

    proptest! {
        #[test]
        fn prop_play_next_is_ring(len in 1usize..20, steps in 1usize..100) {
            let names: Vec<String> = (0..len).map(|i| format!("v{}.mp4", i)).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let sink = RecordingSink::new();
            let mut m = machine(&sink);
            m.handle(PlayerEvent::PlaylistUpdated(playlist(&refs)));

            for step in 1..=steps {
                m.play_next();
                prop_assert_eq!(m.cursor().current_index, step % len);
            }
            prop_assert!(sink.log.lock().max_outstanding <= 1);
        }
    }
}
