//! Recurring poll timer.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::{PollOutcome, SyncEngine};
use super::error::SyncError;

/// Drives [`SyncEngine::poll`] on the configured interval.
///
/// Polls once immediately, then every `poll_interval`. After a failed poll
/// the next one is scheduled per the engine's retry policy (5 s by default);
/// once the retry budget is exhausted it falls back to the poll interval.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let config = self.engine.config().clone();
        info!(
            source = %self.engine.source(),
            interval_secs = config.poll_interval.as_secs(),
            "Sync scheduler started"
        );

        let mut consecutive_failures: u32 = 0;
        loop {
            let delay = match self.engine.poll(&shutdown).await {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    if let PollOutcome::Applied(report) = &outcome {
                        if !report.complete {
                            debug!(
                                fallbacks = report.fallbacks.len(),
                                "Some videos not cached, will retry next poll"
                            );
                        }
                    }
                    config.poll_interval
                }
                Err(SyncError::Cancelled) => break,
                Err(e) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let delay = config
                        .retry_policy
                        .delay_for_retry(consecutive_failures)
                        .unwrap_or(config.poll_interval);
                    warn!(
                        kind = %e.kind(),
                        error = %e,
                        attempt = consecutive_failures,
                        retry_in_secs = delay.as_secs(),
                        "Sync failed"
                    );
                    delay
                }
            };

            if !sleep_or_cancel(delay, &shutdown).await {
                break;
            }
        }

        info!(stats = %self.engine.stats(), "Sync scheduler stopped");
    }
}

/// Sleeps for `delay`; returns `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::probe::tests::sample_mp4;
    use crate::cache::MemoryCache;
    use crate::http::tests::MockHttpClient;
    use crate::manifest::HttpManifestSource;
    use crate::sync::{DownloadConfig, Downloader, SyncConfig};
    use serde_json::json;

    const MANIFEST: &str = "http://signage.test/api/content.php";
    const VIDEO: &str = "http://signage.test/videos/a.mp4";

    fn engine(client: Arc<MockHttpClient>, config: SyncConfig) -> Arc<SyncEngine> {
        let cache = Arc::new(MemoryCache::default());
        let source = Arc::new(HttpManifestSource::new(client.clone(), MANIFEST, None, "k"));
        let downloader = Downloader::new(client, cache.clone(), DownloadConfig::default());
        Arc::new(SyncEngine::new(source, cache, downloader, config))
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let client = Arc::new(MockHttpClient::new());
        client.respond(VIDEO, sample_mp4(64));
        client.respond_json(
            MANIFEST,
            json!({ "version": 1, "content": { "videos": [{ "filename": "a.mp4", "url": VIDEO }] } }),
        );
        let engine = engine(client.clone(), SyncConfig::default());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(SyncScheduler::new(engine.clone()).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(client.request_count(MANIFEST), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.request_count(MANIFEST), 2);
        assert_eq!(engine.stats().unchanged, 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_after_failure_delay() {
        let client = Arc::new(MockHttpClient::new());
        let engine = engine(client.clone(), SyncConfig::default());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(SyncScheduler::new(engine.clone()).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(client.request_count(MANIFEST), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.request_count(MANIFEST), 2);
        assert_eq!(engine.stats().failures, 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let client = Arc::new(MockHttpClient::new());
        let engine = engine(client, SyncConfig::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        tokio::time::timeout(
            Duration::from_secs(1),
            SyncScheduler::new(engine).run(shutdown),
        )
        .await
        .unwrap();
    }
}
