//! Error types for manifest retrieval.

use thiserror::Error;

use crate::http::HttpError;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors that can occur while fetching or parsing a manifest.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ManifestError {
    /// Network failure or non-success status.
    #[error("manifest unavailable from {url}: {reason}")]
    Unavailable { url: String, reason: String },

    /// The fetch did not complete within the configured timeout.
    #[error("manifest fetch from {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The body is not a manifest document.
    #[error("invalid manifest from {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl ManifestError {
    /// Maps a transport error onto the manifest taxonomy.
    pub fn from_http(url: &str, error: HttpError) -> Self {
        match error {
            HttpError::Timeout { timeout_secs, .. } => ManifestError::Timeout {
                url: url.to_string(),
                timeout_secs,
            },
            other => ManifestError::Unavailable {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_timeout() {
        let err = ManifestError::from_http(
            "http://x/content",
            HttpError::Timeout {
                url: "http://x/content".to_string(),
                timeout_secs: 15,
            },
        );
        assert!(matches!(err, ManifestError::Timeout { timeout_secs: 15, .. }));
    }

    #[test]
    fn test_from_http_status() {
        let err = ManifestError::from_http(
            "http://x/content",
            HttpError::Status {
                url: "http://x/content".to_string(),
                status: 401,
            },
        );
        assert!(err.to_string().contains("HTTP 401"));
    }
}
