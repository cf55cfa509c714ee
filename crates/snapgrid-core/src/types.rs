//! Core types for snapgrid
//!
//! Defines the identities and settings shared across the crate:
//! - Slot keys (generation + position)
//! - Task identifiers
//! - Image descriptors handed over by a search client
//! - Grid configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ulid::Ulid;

/// Stable identity of one record within one query generation
///
/// The positional index alone would be reused by the next query; pairing it
/// with the generation keeps keys from different result sets distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    /// Query generation the record belongs to
    pub generation: u64,
    /// Position in the result list
    pub index: usize,
}

impl SlotKey {
    /// Create slot key
    #[inline]
    #[must_use]
    pub fn new(generation: u64, index: usize) -> Self {
        Self { generation, index }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.generation, self.index)
    }
}

/// Unique download task identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One search hit: display label plus the location of its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Display label (may be empty)
    pub name: String,
    /// Where to fetch the image bytes from
    pub url: String,
}

impl ImageDescriptor {
    /// Create descriptor
    #[inline]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Grid configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Maximum downloads running at once
    pub max_concurrent_fetches: usize,
    /// Per-fetch deadline in seconds
    pub fetch_timeout_secs: u64,
    /// Longest edge of decoded images; `None` keeps full size
    pub thumbnail_size: Option<u32>,
    /// Decoded images kept by URL; 0 disables the cache
    pub cache_capacity: u64,
    /// Distance from the end of the list that triggers the next page
    pub prefetch_threshold: usize,
}

impl GridConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max concurrent fetches
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// With fetch timeout
    #[inline]
    #[must_use]
    pub fn with_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    /// With thumbnail edge
    #[inline]
    #[must_use]
    pub fn with_thumbnail_size(mut self, size: Option<u32>) -> Self {
        self.thumbnail_size = size;
        self
    }

    /// With decoded-image cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// With pagination threshold
    #[inline]
    #[must_use]
    pub fn with_prefetch_threshold(mut self, threshold: usize) -> Self {
        self.prefetch_threshold = threshold;
        self
    }

    /// Fetch deadline as a duration
    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 6,
            fetch_timeout_secs: 30,
            thumbnail_size: None,
            cache_capacity: 256,
            prefetch_threshold: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_key_display() {
        assert_eq!(SlotKey::new(3, 17).to_string(), "3#17");
    }

    #[test]
    fn slot_keys_differ_across_generations() {
        assert_ne!(SlotKey::new(1, 0), SlotKey::new(2, 0));
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn config_builders() {
        let config = GridConfig::new()
            .with_max_concurrent_fetches(2)
            .with_fetch_timeout_secs(5)
            .with_thumbnail_size(Some(256));

        assert_eq!(config.max_concurrent_fetches, 2);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.thumbnail_size, Some(256));
        assert_eq!(config.cache_capacity, 256);
    }
}
