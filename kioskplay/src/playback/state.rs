//! Playback states, events and the cursor.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::manifest::Playlist;

/// State of the playback loop. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// No playlist, or the playlist is empty.
    #[default]
    Idle,
    /// A source was handed to the sink; waiting for it to start.
    Loading,
    /// The sink is playing.
    Playing,
    /// The current video failed; a retry or skip is pending.
    Stalled,
    /// Moving to the next index.
    Advancing,
}

impl PlaybackState {
    /// Human-readable description for status output.
    pub fn describe(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "waiting for playlist",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Stalled => "stalled, retrying",
            PlaybackState::Advancing => "advancing",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Stalled => "stalled",
            PlaybackState::Advancing => "advancing",
        };
        f.write_str(name)
    }
}

/// Position in the active playlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    /// Index into the active playlist.
    pub current_index: usize,
    /// Retries spent on the current index.
    pub retry_count: u32,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to `(current_index + 1) mod len` and resets the retry count.
    ///
    /// Returns the new index, or `None` for an empty playlist.
    pub fn advance(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        self.current_index = (self.current_index + 1) % len;
        self.retry_count = 0;
        Some(self.current_index)
    }

    /// Jumps to `index mod len` and resets the retry count.
    pub fn jump(&mut self, index: usize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        self.current_index = index % len;
        self.retry_count = 0;
        Some(self.current_index)
    }

    /// Brings an out-of-range index back into `0..len`.
    pub fn clamp(&mut self, len: usize) {
        if len > 0 {
            self.current_index %= len;
        }
    }
}

/// Identifies one `load` call on a sink.
///
/// Sink events carry the id of the load they belong to; events for anything
/// but the current load are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LoadId(u64);

impl LoadId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a sink reports about the current load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEventKind {
    /// Playback started.
    Started,
    /// Playback is making progress.
    Progress,
    /// Playback is waiting on data.
    Buffering,
    /// Natural end of stream.
    Ended,
    /// The sink gave up on the source (decode or network).
    Stalled,
    /// The sink failed outright.
    Errored(String),
}

/// A sink report tagged with the load it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub load_id: LoadId,
    pub kind: SinkEventKind,
}

impl SinkEvent {
    pub fn new(load_id: LoadId, kind: SinkEventKind) -> Self {
        Self { load_id, kind }
    }
}

/// Input to the playback transition function.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The sync engine published a new snapshot.
    PlaylistUpdated(Arc<Playlist>),
    /// An event from the sink for the current load.
    Sink(SinkEventKind),
    /// The retry delay elapsed.
    RetryElapsed,
    /// Buffering made no progress for the stall timeout.
    StallTimeout,
}

/// Which timer is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Fires [`PlayerEvent::RetryElapsed`].
    Retry,
    /// Fires [`PlayerEvent::StallTimeout`].
    Stall,
}

/// What the driver should do with its single pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Leave the current timer as is.
    Keep,
    /// Cancel the current timer.
    Clear,
    /// Replace the current timer.
    Arm(TimerKind, Duration),
}

/// Observable playback status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Filename of the loaded video.
    pub current_video: Option<String>,
    /// Index of the loaded video.
    pub index: Option<usize>,
    pub retry_count: u32,
    pub playlist_len: usize,
    /// Whether the loaded video is served from the cache.
    pub cached: bool,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.current_video, self.index) {
            (Some(video), Some(index)) => {
                write!(
                    f,
                    "{} {} ({}/{})",
                    self.state.describe(),
                    video,
                    index + 1,
                    self.playlist_len
                )?;
                if self.retry_count > 0 {
                    write!(f, " retry {}", self.retry_count)?;
                }
                Ok(())
            }
            _ => f.write_str(self.state.describe()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cursor_ring_advance() {
        let mut cursor = PlaybackCursor::new();
        let visited: Vec<usize> = (0..7).filter_map(|_| cursor.advance(3)).collect();
        assert_eq!(visited, vec![1, 2, 0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_cursor_advance_resets_retries() {
        let mut cursor = PlaybackCursor {
            current_index: 0,
            retry_count: 3,
        };
        cursor.advance(2);
        assert_eq!(cursor.retry_count, 0);
        assert_eq!(cursor.current_index, 1);
    }

    #[test]
    fn test_cursor_empty_playlist() {
        let mut cursor = PlaybackCursor::new();
        assert_eq!(cursor.advance(0), None);
        assert_eq!(cursor.jump(4, 0), None);
    }

    #[test]
    fn test_load_id_next() {
        let id = LoadId::new(7);
        assert_eq!(id.next().get(), 8);
        assert!(id.next() > id);
        assert_eq!(id.to_string(), "#7");
    }

    #[test]
    fn test_status_display() {
        let status = PlaybackStatus {
            state: PlaybackState::Playing,
            current_video: Some("a.mp4".to_string()),
            index: Some(0),
            retry_count: 0,
            playlist_len: 3,
            cached: true,
        };
        assert_eq!(status.to_string(), "playing a.mp4 (1/3)");

        let idle = PlaybackStatus::default();
        assert_eq!(idle.to_string(), "waiting for playlist");
    }

    proptest! {
        #[test]
        fn prop_clamp_stays_in_range(index in 0usize..10_000, len in 1usize..500) {
            let mut cursor = PlaybackCursor { current_index: index, retry_count: 0 };
            cursor.clamp(len);
            prop_assert!(cursor.current_index < len);
            prop_assert_eq!(cursor.current_index, index % len);
        }

        #[test]
        fn prop_advance_is_ring(len in 1usize..50, steps in 1usize..200) {
            let mut cursor = PlaybackCursor::new();
            for step in 1..=steps {
                let index = cursor.advance(len).unwrap();
                prop_assert_eq!(index, step % len);
            }
        }
    }
}
