//! Application error types.

use std::fmt;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::http::HttpError;
use crate::logging::LoggingError;
use crate::sync::SyncError;

/// Errors that can occur while starting or running the kiosk.
#[derive(Debug)]
pub enum AppError {
    /// Configuration file could not be read or is incomplete.
    Config(ConfigError),

    /// HTTP client could not be constructed.
    HttpClient(HttpError),

    /// Cache directory could not be opened.
    Cache(CacheError),

    /// A one-shot sync failed.
    Sync(SyncError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::HttpClient(e) => write!(f, "HTTP client error: {}", e),
            AppError::Cache(e) => write!(f, "Failed to open video cache: {}", e),
            AppError::Sync(e) => write!(f, "Sync failed: {}", e),
            AppError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            AppError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::HttpClient(e) => Some(e),
            AppError::Cache(e) => Some(e),
            AppError::Sync(e) => Some(e),
            AppError::Logging(e) => Some(e),
            AppError::RuntimeCreation(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e)
    }
}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        AppError::HttpClient(e)
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        AppError::Sync(e)
    }
}

impl From<LoggingError> for AppError {
    fn from(e: LoggingError) -> Self {
        AppError::Logging(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config(ConfigError::MissingValue("manifest.url".to_string()));
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("manifest.url"));
    }

    #[test]
    fn test_app_error_from_sync_error() {
        let app_err: AppError = SyncError::Cancelled.into();
        assert!(matches!(app_err, AppError::Sync(SyncError::Cancelled)));
        assert!(std::error::Error::source(&app_err).is_some());
    }
}
