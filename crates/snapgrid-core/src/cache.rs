//! Decoded-image cache keyed by source URL
//!
//! Lets a repeated query reuse images already decoded in an earlier
//! generation. Keys are URLs, never view positions. Failures are not cached.

use crate::record::DecodedImage;
use moka::future::Cache;
use std::sync::Arc;

/// Concurrent URL -> decoded image cache
#[derive(Debug, Clone)]
pub struct ImageCache {
    inner: Cache<String, Arc<DecodedImage>>,
}

impl ImageCache {
    /// Create cache with max capacity; `None` for a capacity of zero
    #[must_use]
    pub fn new(max_capacity: u64) -> Option<Self> {
        (max_capacity > 0).then(|| Self {
            inner: Cache::new(max_capacity),
        })
    }

    /// Look up a decoded image
    #[inline]
    pub async fn get(&self, url: &str) -> Option<Arc<DecodedImage>> {
        self.inner.get(url).await
    }

    /// Store a decoded image
    #[inline]
    pub async fn insert(&self, url: &str, image: Arc<DecodedImage>) {
        self.inner.insert(url.to_string(), image).await;
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn decoded() -> Arc<DecodedImage> {
        Arc::new(DecodedImage::new(DynamicImage::new_rgb8(1, 1)))
    }

    #[test]
    fn zero_capacity_disables_cache() {
        assert!(ImageCache::new(0).is_none());
    }

    #[tokio::test]
    async fn cache_insert_and_get() {
        let cache = ImageCache::new(10).unwrap();
        cache.insert("http://x/a.jpg", decoded()).await;

        assert!(cache.get("http://x/a.jpg").await.is_some());
        assert!(cache.get("http://x/b.jpg").await.is_none());
    }
}
