//! HTTP client abstraction for testability.
//!
//! The manifest source, the video downloader and the status reporter all talk
//! HTTP through [`AsyncHttpClient`], so tests can substitute a mock client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Default timeout for manifest and status requests in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors produced by HTTP requests.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HttpError {
    /// The request did not complete within the client timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, DNS or body read failure.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Extra headers attached to a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    /// Creates an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Adds `X-API-Key` when a non-empty key is configured.
    pub fn with_api_key(self, api_key: Option<&str>) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => self.with("X-API-Key", key),
            _ => self,
        }
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Looks up a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    fn apply(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in self.iter() {
            builder = builder.header(name, value);
        }
        builder
    }
}

/// Trait for async HTTP operations.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs a GET request and returns the full response body.
    fn get(&self, url: &str, headers: &RequestHeaders) -> BoxFuture<'_, Result<Bytes, HttpError>>;

    /// POSTs a JSON body and returns the response status code.
    fn post_json(
        &self,
        url: &str,
        headers: &RequestHeaders,
        body: serde_json::Value,
    ) -> BoxFuture<'_, Result<u16, HttpError>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a client with the default request timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Creates a client whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(crate::user_agent())
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Returns the configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(url: &str, timeout: Duration, error: reqwest::Error) -> HttpError {
        if error.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }
        } else if let Some(status) = error.status() {
            HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            HttpError::Transport {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

impl AsyncHttpClient for ReqwestClient {
    fn get(&self, url: &str, headers: &RequestHeaders) -> BoxFuture<'_, Result<Bytes, HttpError>> {
        let request = headers.apply(self.client.get(url));
        let url = url.to_string();
        let timeout = self.timeout;

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| Self::classify(&url, timeout, e))?;

            if !response.status().is_success() {
                return Err(HttpError::Status {
                    url,
                    status: response.status().as_u16(),
                });
            }

            response
                .bytes()
                .await
                .map_err(|e| Self::classify(&url, timeout, e))
        })
    }

    fn post_json(
        &self,
        url: &str,
        headers: &RequestHeaders,
        body: serde_json::Value,
    ) -> BoxFuture<'_, Result<u16, HttpError>> {
        let request = headers.apply(self.client.post(url)).json(&body);
        let url = url.to_string();
        let timeout = self.timeout;

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| Self::classify(&url, timeout, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(HttpError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            Ok(status.as_u16())
        })
    }
}
