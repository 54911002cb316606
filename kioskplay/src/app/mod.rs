//! Application bootstrap and lifecycle management.
//!
//! [`KioskApp`] starts every long-running part of the kiosk in the right
//! order and stops them together.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        KioskApp                          │
//! │                                                          │
//! │  1. LocalCache (disk or memory)                          │
//! │  2. SyncEngine ◄── HttpManifestSource, Downloader        │
//! │  3. PlaybackDriver ── subscribes to the engine playlist  │
//! │  4. SyncScheduler ── first poll runs immediately         │
//! │  5. StatusReporter ── optional                           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use kioskplay::app::{AppConfig, KioskApp};
//!
//! let app = KioskApp::start(AppConfig::from_config_file(&config)?).await?;
//! app.wait().await;
//! app.shutdown().await;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{build_engine, open_engine, AppComponents, KioskApp};
pub use config::{AppConfig, CacheBackend};
pub use error::AppError;
