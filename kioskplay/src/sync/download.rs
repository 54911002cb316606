//! Brings individual videos into the local cache.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::DownloadConfig;
use super::error::DownloadError;
use crate::cache::{CacheError, CachedVideo, LocalCache};
use crate::http::{AsyncHttpClient, HttpError, RequestHeaders};
use crate::manifest::VideoDescriptor;

/// How an entry ended up with its cached copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// A verified copy was already in the cache.
    AlreadyCached(CachedVideo),
    /// The video was downloaded, stored and verified.
    Downloaded(CachedVideo),
}

impl Acquired {
    pub fn cached(&self) -> &CachedVideo {
        match self {
            Acquired::AlreadyCached(video) | Acquired::Downloaded(video) => video,
        }
    }

    pub fn into_cached(self) -> CachedVideo {
        match self {
            Acquired::AlreadyCached(video) | Acquired::Downloaded(video) => video,
        }
    }
}

/// Fetches videos into a [`LocalCache`] and verifies the stored copy.
pub struct Downloader {
    client: Arc<dyn AsyncHttpClient>,
    cache: Arc<dyn LocalCache>,
    config: DownloadConfig,
    headers: RequestHeaders,
}

impl Downloader {
    pub fn new(
        client: Arc<dyn AsyncHttpClient>,
        cache: Arc<dyn LocalCache>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            client,
            cache,
            config,
            headers: RequestHeaders::new(),
        }
    }

    /// Headers sent with every video request.
    pub fn with_headers(mut self, headers: RequestHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Ensures a verified copy of `video` is cached.
    ///
    /// An existing copy is verified and reused. A copy that fails
    /// verification is deleted and downloaded again. A freshly downloaded
    /// copy that fails verification is deleted so the next sync retries it.
    pub async fn acquire(
        &self,
        video: &VideoDescriptor,
        shutdown: &CancellationToken,
    ) -> Result<Acquired, DownloadError> {
        let filename = video.filename.as_str();

        if self.cache.exists(filename).await.map_err(|e| cache_err(filename, e))? {
            match self.cache.verify(filename).await {
                Ok(cached) => return Ok(Acquired::AlreadyCached(cached)),
                Err(e) => {
                    warn!(filename, error = %e, "Cached copy failed verification, downloading again");
                    self.discard(filename).await;
                }
            }
        }

        let bytes = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                return Err(DownloadError::Cancelled { filename: filename.to_string() });
            }
            result = tokio::time::timeout(
                self.config.timeout,
                self.client.get(&video.source_url, &self.headers),
            ) => match result {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(HttpError::Timeout { .. })) | Err(_) => {
                    return Err(DownloadError::Timeout {
                        filename: filename.to_string(),
                        timeout_secs: self.config.timeout.as_secs(),
                    });
                }
                Ok(Err(source)) => {
                    return Err(DownloadError::Fetch { filename: filename.to_string(), source });
                }
            }
        };

        // Once the bytes are in hand the save runs to completion; the cache
        // write is atomic, so shutdown never observes a partial file.
        self.cache
            .save(filename, bytes)
            .await
            .map_err(|e| cache_err(filename, e))?;

        match self.cache.verify(filename).await {
            Ok(cached) => {
                debug!(
                    filename,
                    bytes = cached.size_bytes,
                    container = %cached.container,
                    "Downloaded video"
                );
                Ok(Acquired::Downloaded(cached))
            }
            Err(e) => {
                self.discard(filename).await;
                Err(cache_err(filename, e))
            }
        }
    }

    /// Deletes a copy that failed verification.
    async fn discard(&self, filename: &str) {
        if let Err(e) = self.cache.remove(filename).await {
            warn!(filename, error = %e, "Failed to remove unverified copy");
        }
    }
}

fn cache_err(filename: &str, source: CacheError) -> DownloadError {
    DownloadError::Cache {
        filename: filename.to_string(),
        source,
    }
}
