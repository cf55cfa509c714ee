//! Image byte transport over reqwest

use async_trait::async_trait;
use snapgrid_core::{DownloadError, ImageFetcher};

/// Fetches image bytes with a plain HTTP GET
#[derive(Debug, Clone, Default)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create fetcher with a default HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create fetcher sharing an existing HTTP client
    #[must_use]
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.http.get(url).send().await.map_err(DownloadError::fetch)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Fetch(format!("HTTP {status} for {url}")));
        }

        let bytes = response.bytes().await.map_err(DownloadError::fetch)?;
        tracing::trace!(url, len = bytes.len(), "image bytes received");
        Ok(bytes.to_vec())
    }
}
