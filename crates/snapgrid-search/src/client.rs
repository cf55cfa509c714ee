//! Search client contract and the Flickr implementation

use crate::error::{SearchError, SearchResult};
use crate::flickr::{parse_search_response, PhotoSize};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snapgrid_core::ImageDescriptor;
use std::time::Duration;

/// Default REST endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.flickr.com/services/rest/";

/// Results per page requested from the endpoint
pub const DEFAULT_PER_PAGE: u32 = 50;

/// Photo search collaborator
///
/// Returns one page of results in display order. An empty page means there
/// is nothing more to load.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Search photos tagged with `tags`; `page` starts at 1
    async fn search(&self, tags: &str, page: u32) -> SearchResult<Vec<ImageDescriptor>>;
}

/// Search endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// API key; usually taken from `FLICKR_API_KEY`
    pub api_key: Option<String>,

    /// REST endpoint
    pub endpoint: String,

    /// Results per page
    pub per_page: u32,

    /// Size of the images the descriptors point at
    pub photo_size: PhotoSize,

    /// Request deadline
    pub timeout_secs: u64,
}

impl SearchConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set page size
    #[must_use]
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Set image size
    #[must_use]
    pub fn with_photo_size(mut self, size: PhotoSize) -> Self {
        self.photo_size = size;
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            per_page: DEFAULT_PER_PAGE,
            photo_size: PhotoSize::default(),
            timeout_secs: 30,
        }
    }
}

/// `flickr.photos.search` over reqwest
#[derive(Debug, Clone)]
pub struct FlickrClient {
    http: reqwest::Client,
    api_key: String,
    config: SearchConfig,
}

impl FlickrClient {
    /// Create client from config
    ///
    /// # Errors
    /// - `SearchError::MissingApiKey` without an API key
    /// - `SearchError::Network` if the HTTP client cannot be built
    pub fn new(config: SearchConfig) -> SearchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SearchError::network)?;
        Self::with_http(http, config)
    }

    /// Create client sharing an existing HTTP client
    ///
    /// # Errors
    /// `SearchError::MissingApiKey` without an API key.
    pub fn with_http(http: reqwest::Client, config: SearchConfig) -> SearchResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SearchError::MissingApiKey)?;
        Ok(Self {
            http,
            api_key,
            config,
        })
    }

    /// Client configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Query parameters for one page
    #[must_use]
    pub fn query(&self, tags: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("method", "flickr.photos.search".to_string()),
            ("format", "json".to_string()),
            ("nojsoncallback", "1".to_string()),
            ("safe_search", "1".to_string()),
            ("content_type", "1".to_string()),
            ("per_page", self.config.per_page.to_string()),
            ("page", page.max(1).to_string()),
            ("api_key", self.api_key.clone()),
            ("tags", tags.to_string()),
        ]
    }
}

#[async_trait]
impl SearchClient for FlickrClient {
    async fn search(&self, tags: &str, page: u32) -> SearchResult<Vec<ImageDescriptor>> {
        let tags = tags.trim();
        if tags.is_empty() {
            tracing::debug!("empty tags; skipping search");
            return Ok(Vec::new());
        }

        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&self.query(tags, page))
            .send()
            .await
            .map_err(SearchError::network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(SearchError::network)?;
        let photos = parse_search_response(&body)?;
        tracing::info!(
            tags,
            page = photos.page,
            pages = photos.pages,
            count = photos.photo.len(),
            "search page received"
        );

        Ok(photos
            .photo
            .iter()
            .map(|photo| photo.descriptor(self.config.photo_size))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.per_page, 50);
        assert_eq!(config.photo_size, PhotoSize::Large1024);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn client_requires_api_key() {
        assert_eq!(
            FlickrClient::new(SearchConfig::new()).unwrap_err(),
            SearchError::MissingApiKey
        );
        assert_eq!(
            FlickrClient::new(SearchConfig::new().with_api_key("  ")).unwrap_err(),
            SearchError::MissingApiKey
        );
    }

    #[test]
    fn query_carries_all_parameters() {
        let client = FlickrClient::new(SearchConfig::new().with_api_key("k3y").with_per_page(25)).unwrap();
        let query = client.query("cats", 3);

        let get = |name: &str| {
            query
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(get("method"), Some("flickr.photos.search"));
        assert_eq!(get("nojsoncallback"), Some("1"));
        assert_eq!(get("safe_search"), Some("1"));
        assert_eq!(get("content_type"), Some("1"));
        assert_eq!(get("per_page"), Some("25"));
        assert_eq!(get("page"), Some("3"));
        assert_eq!(get("api_key"), Some("k3y"));
        assert_eq!(get("tags"), Some("cats"));
    }

    #[test]
    fn page_zero_is_first_page() {
        let client = FlickrClient::new(SearchConfig::new().with_api_key("k")).unwrap();
        assert!(client.query("cats", 0).contains(&("page", "1".to_string())));
    }

    #[tokio::test]
    async fn empty_tags_skip_request() {
        let client = FlickrClient::new(
            SearchConfig::new()
                .with_api_key("k")
                .with_endpoint("http://127.0.0.1:1/unreachable"),
        )
        .unwrap();
        assert!(client.search("   ", 1).await.unwrap().is_empty());
    }
}
