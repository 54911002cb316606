//! Async driver for the playback state machine.
//!
//! Multiplexes the three event sources of the loop (published playlists,
//! sink events and the single pending timer) into [`PlaybackLoop::handle`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::machine::PlaybackLoop;
use super::sink::SinkEventReceiver;
use super::state::{PlaybackStatus, PlayerEvent, TimerCommand, TimerKind};
use crate::manifest::Playlist;

/// Runs a [`PlaybackLoop`] until shutdown.
pub struct PlaybackDriver {
    machine: PlaybackLoop,
    playlist_rx: watch::Receiver<Arc<Playlist>>,
    events: SinkEventReceiver,
}

impl PlaybackDriver {
    /// # Arguments
    ///
    /// * `machine` - The loop to drive
    /// * `playlist_rx` - Snapshots published by the sync engine
    /// * `events` - Receiver paired with the loop's sink
    pub fn new(
        machine: PlaybackLoop,
        playlist_rx: watch::Receiver<Arc<Playlist>>,
        events: SinkEventReceiver,
    ) -> Self {
        Self {
            machine,
            playlist_rx,
            events,
        }
    }

    /// Receiver of playback status updates.
    pub fn status_receiver(&self) -> watch::Receiver<PlaybackStatus> {
        self.machine.status_receiver()
    }

    /// Runs until `shutdown` is cancelled, then releases the sink.
    ///
    /// Returns the loop so callers can inspect its final state.
    pub async fn run(mut self, shutdown: CancellationToken) -> PlaybackLoop {
        info!("Playback loop started");

        let mut timer: Option<(TimerKind, Instant)> = None;
        let initial = self.playlist_rx.borrow_and_update().clone();
        apply(&mut timer, self.machine.handle(PlayerEvent::PlaylistUpdated(initial)));

        let mut playlist_open = true;
        loop {
            let deadline = timer.map(|(_, at)| at);
            let command = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                changed = self.playlist_rx.changed(), if playlist_open => {
                    if changed.is_err() {
                        debug!("Playlist publisher closed, keeping last snapshot");
                        playlist_open = false;
                        continue;
                    }
                    let playlist = self.playlist_rx.borrow_and_update().clone();
                    self.machine.handle(PlayerEvent::PlaylistUpdated(playlist))
                }

                Some(event) = self.events.recv() => self.machine.handle_sink_event(event),

                _ = sleep_until(deadline) => {
                    match timer.take() {
                        Some((TimerKind::Retry, _)) => self.machine.handle(PlayerEvent::RetryElapsed),
                        Some((TimerKind::Stall, _)) => self.machine.handle(PlayerEvent::StallTimeout),
                        None => TimerCommand::Keep,
                    }
                }
            };
            apply(&mut timer, command);
        }

        self.machine.stop();
        info!("Playback loop stopped");
        self.machine
    }
}

fn apply(timer: &mut Option<(TimerKind, Instant)>, command: TimerCommand) {
    match command {
        TimerCommand::Keep => {}
        TimerCommand::Clear => *timer = None,
        TimerCommand::Arm(kind, delay) => *timer = Some((kind, Instant::now() + delay)),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
