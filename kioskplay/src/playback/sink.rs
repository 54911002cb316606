//! Video output sinks.
//!
//! A sink plays one source at a time. `load` hands it a source and returns
//! immediately; progress is reported asynchronously as [`SinkEvent`]s on the
//! channel the sink was created with, tagged with the [`LoadId`] passed to
//! `load`. The playback loop always calls `release` before the next `load`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::state::{LoadId, SinkEvent, SinkEventKind};
use crate::manifest::PlaybackSource;

/// Sending half of a sink event channel.
pub type SinkEventSender = mpsc::UnboundedSender<SinkEvent>;

/// Receiving half of a sink event channel.
pub type SinkEventReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// Creates a sink event channel.
pub fn sink_channel() -> (SinkEventSender, SinkEventReceiver) {
    mpsc::unbounded_channel()
}

/// Errors returned synchronously by [`OutputSink::load`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The player process could not be started.
    #[error("failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The sink cannot play this kind of source.
    #[error("unsupported source {0}")]
    Unsupported(String),
}

/// A single video output.
pub trait OutputSink: Send {
    /// Starts playing `source`. Events for it carry `load_id`.
    fn load(&mut self, load_id: LoadId, source: &PlaybackSource<'_>) -> Result<(), SinkError>;

    /// Stops playback and frees every resource held for the current source.
    ///
    /// Idempotent.
    fn release(&mut self);

    /// Hint that `source` plays next.
    fn preload(&mut self, _source: &PlaybackSource<'_>) {}

    /// Short sink name for logs.
    fn name(&self) -> &str;
}

// =============================================================================
// External Player Sink
// =============================================================================

/// Default player program.
pub const DEFAULT_PLAYER: &str = "mpv";

/// Default player arguments, placed before the source location.
pub const DEFAULT_PLAYER_ARGS: &[&str] = &["--fs", "--no-terminal", "--really-quiet"];

/// How often the watcher checks whether the player has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for a killed player to be reaped.
const KILL_REAP_TIMEOUT: Duration = Duration::from_millis(500);

/// A spawned player and the task reporting its exit.
struct RunningPlayer {
    child: Arc<Mutex<Child>>,
    watcher: JoinHandle<()>,
}

/// Plays each video in an external player process.
///
/// Reports `Started` once the process is spawned, `Ended` when it exits with
/// status zero and `Errored` otherwise. Releasing kills and reaps the process
/// before returning, so two players never run at once.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    events: SinkEventSender,
    current: Option<RunningPlayer>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>, events: SinkEventSender) -> Self {
        Self {
            program: program.into(),
            args,
            events,
            current: None,
        }
    }

    /// `mpv` with the default arguments.
    pub fn mpv(events: SinkEventSender) -> Self {
        Self::new(
            DEFAULT_PLAYER,
            DEFAULT_PLAYER_ARGS.iter().map(|a| a.to_string()).collect(),
            events,
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether a player process is being watched.
    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|player| !player.watcher.is_finished())
    }

    /// OS process id of the current player, while it runs.
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().and_then(|player| player.child.lock().id())
    }
}

/// Waits for the player to exit and reports how it ended.
async fn watch_player(child: Arc<Mutex<Child>>, load_id: LoadId, events: SinkEventSender) {
    let kind = loop {
        // The lock is never held across an await.
        let polled = child.lock().try_wait();
        match polled {
            Ok(Some(status)) if status.success() => break SinkEventKind::Ended,
            Ok(Some(status)) => {
                break SinkEventKind::Errored(format!("player exited with {}", status))
            }
            Ok(None) => tokio::time::sleep(EXIT_POLL_INTERVAL).await,
            Err(e) => break SinkEventKind::Errored(e.to_string()),
        }
    };
    let _ = events.send(SinkEvent::new(load_id, kind));
}

/// Kills the player and waits briefly until the OS has reaped it.
fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        // Already exited.
        debug!(error = %e, "Player kill skipped");
    }

    let deadline = Instant::now() + KILL_REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(2)),
            Ok(None) => {
                warn!(pid = ?child.id(), "Player still running after kill");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to reap player");
                return;
            }
        }
    }
}

impl OutputSink for CommandSink {
    fn load(&mut self, load_id: LoadId, source: &PlaybackSource<'_>) -> Result<(), SinkError> {
        self.release();

        let location = source.location();
        if location.starts_with("memory://") {
            return Err(SinkError::Unsupported(location));
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&location)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SinkError::Spawn {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        debug!(program = %self.program, location = %location, load = %load_id, "Player started");
        let _ = self.events.send(SinkEvent::new(load_id, SinkEventKind::Started));

        let child = Arc::new(Mutex::new(child));
        let watcher = tokio::spawn(watch_player(child.clone(), load_id, self.events.clone()));
        self.current = Some(RunningPlayer { child, watcher });
        Ok(())
    }

    fn release(&mut self) {
        if let Some(player) = self.current.take() {
            // Abort first so a killed player reports no exit event.
            player.watcher.abort();
            kill_and_reap(&mut player.child.lock());
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

impl Drop for CommandSink {
    fn drop(&mut self) {
        self.release();
    }
}
