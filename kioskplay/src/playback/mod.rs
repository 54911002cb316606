//! Resilient playback loop.
//!
//! The loop plays the published playlist as a perpetual ring on a single
//! output sink, retrying failed videos with backoff and skipping them once
//! the retry budget is spent.
//!
//! ```text
//!   watch<Arc<Playlist>> ──┐
//!   SinkEvent channel  ────┼──► PlaybackDriver ──handle()──► PlaybackLoop ──► OutputSink
//!   pending timer      ────┘                                      │
//!                                                                 └──► watch<PlaybackStatus>
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (events_tx, events_rx) = sink_channel();
//! let sink = CommandSink::mpv(events_tx);
//! let machine = PlaybackLoop::new(Box::new(sink), PlaybackConfig::default());
//! let driver = PlaybackDriver::new(machine, engine.subscribe(), events_rx);
//! tokio::spawn(driver.run(shutdown.clone()));
//! ```

mod config;
mod driver;
mod machine;
pub(crate) mod sink;
mod state;

pub use config::{PlaybackConfig, DEFAULT_STALL_TIMEOUT_SECS};
pub use driver::PlaybackDriver;
pub use machine::PlaybackLoop;
pub use sink::{
    sink_channel, CommandSink, OutputSink, SinkError, SinkEventReceiver, SinkEventSender,
    DEFAULT_PLAYER, DEFAULT_PLAYER_ARGS,
};
pub use state::{
    LoadId, PlaybackCursor, PlaybackState, PlaybackStatus, PlayerEvent, SinkEvent,
    SinkEventKind, TimerCommand, TimerKind,
};
