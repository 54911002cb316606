//! Manifest sources.

use std::sync::Arc;

use tracing::debug;

use super::error::{ManifestError, ManifestResult};
use super::model::Manifest;
use super::wire::parse_manifest;
use crate::http::{AsyncHttpClient, BoxFuture, RequestHeaders};

/// Something that can produce the current manifest.
pub trait ManifestSource: Send + Sync {
    /// Fetches and normalizes the current manifest.
    fn fetch(&self) -> BoxFuture<'_, ManifestResult<Manifest>>;

    /// Human-readable location for logs.
    fn describe(&self) -> &str;
}

/// Manifest served by an HTTP endpoint.
///
/// Sends `Accept: application/json`, the device id, and the API key when one
/// is configured. The request timeout is the timeout of the supplied client.
pub struct HttpManifestSource {
    client: Arc<dyn AsyncHttpClient>,
    url: String,
    headers: RequestHeaders,
}

impl HttpManifestSource {
    /// Creates a source for `url`.
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client (its timeout bounds the fetch)
    /// * `url` - Manifest endpoint
    /// * `api_key` - Optional value for the `X-API-Key` header
    /// * `device_id` - Value for the `X-Device-Id` header
    pub fn new(
        client: Arc<dyn AsyncHttpClient>,
        url: impl Into<String>,
        api_key: Option<&str>,
        device_id: &str,
    ) -> Self {
        let headers = RequestHeaders::new()
            .with("Accept", "application/json")
            .with("Cache-Control", "no-store")
            .with("X-Device-Id", device_id)
            .with_api_key(api_key);

        Self {
            client,
            url: url.into(),
            headers,
        }
    }
}

impl ManifestSource for HttpManifestSource {
    fn fetch(&self) -> BoxFuture<'_, ManifestResult<Manifest>> {
        Box::pin(async move {
            let body = self
                .client
                .get(&self.url, &self.headers)
                .await
                .map_err(|e| ManifestError::from_http(&self.url, e))?;

            let manifest = parse_manifest(&body, &self.url)?;
            debug!(
                url = %self.url,
                videos = manifest.videos.len(),
                version = ?manifest.version,
                "Fetched manifest"
            );
            Ok(manifest)
        })
    }

    fn describe(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockHttpClient;
    use crate::http::HttpError;
    use serde_json::json;

    const URL: &str = "http://signage.test/api/content.php";

    #[tokio::test]
    async fn test_fetch_parses_manifest_and_sends_headers() {
        let client = Arc::new(MockHttpClient::new());
        client.respond_json(
            URL,
            json!({ "version": 7, "content": { "videos": [
                { "filename": "a.mp4", "url": "http://signage.test/videos/a.mp4" }
            ]}}),
        );
        let source = HttpManifestSource::new(client.clone(), URL, Some("key"), "kiosk-1");

        let manifest = source.fetch().await.unwrap();
        assert_eq!(manifest.videos.len(), 1);
        assert_eq!(manifest.effective_version().as_str(), "7");

        let headers = client.last_headers(URL).unwrap();
        assert_eq!(headers.get("X-API-Key"), Some("key"));
        assert_eq!(headers.get("X-Device-Id"), Some("kiosk-1"));
        assert_eq!(headers.get("Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_fetch_maps_http_failure() {
        let client = Arc::new(MockHttpClient::new());
        client.fail(
            URL,
            HttpError::Transport {
                url: URL.to_string(),
                reason: "connection refused".to_string(),
            },
        );
        let source = HttpManifestSource::new(client, URL, None, "kiosk-1");

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, ManifestError::Unavailable { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_describe_is_url() {
        let client = Arc::new(MockHttpClient::new());
        let source = HttpManifestSource::new(client, URL, None, "kiosk-1");
        assert_eq!(source.describe(), URL);
    }
}
