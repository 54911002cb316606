//! Shared setup for long-running commands.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use kioskplay::app::{AppConfig, AppError};
use kioskplay::config::ConfigFile;
use kioskplay::logging::{init_logging, LoggingConfig, LoggingGuard};

use crate::commands::common::load_config;
use crate::error::CliError;

/// Loads the config, installs logging and owns the Tokio runtime.
pub struct CliRunner {
    config_path: PathBuf,
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Prepares a command that needs the manifest URL.
    pub fn new(config_path: &Path) -> Result<Self, CliError> {
        let config = load_config(config_path)?;
        config.require_manifest_url()?;

        let logging = init_logging(&LoggingConfig::from(&config.logging)).map_err(AppError::from)?;
        let runtime = Runtime::new().map_err(|e| AppError::RuntimeCreation(e.to_string()))?;

        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
            runtime,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Component configuration derived from the config file.
    pub fn app_config(&self) -> Result<AppConfig, CliError> {
        Ok(AppConfig::from_config_file(&self.config)?)
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = kioskplay::VERSION,
            command,
            config = %self.config_path.display(),
            "kioskplay starting"
        );
    }

    /// Runs `future` to completion on the runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Returns a token cancelled on Ctrl+C.
    pub fn shutdown_on_ctrlc(&self, message: &'static str) -> Result<CancellationToken, CliError> {
        let token = CancellationToken::new();
        let handler_token = token.clone();
        ctrlc::set_handler(move || {
            println!();
            println!("{}", message);
            handler_token.cancel();
        })
        .map_err(|e| CliError::Signal(e.to_string()))?;
        Ok(token)
    }
}
