//! CLI command implementations.

pub mod cache;
pub mod common;
pub mod config;
pub mod init;
pub mod run;
pub mod sync;
