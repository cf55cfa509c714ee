//! Ordered search results for the current query generation
//!
//! The store is append-only within a generation. `reset` starts a new
//! generation; every task snapshots the generation it was issued under and
//! checks it again before touching its record.

use crate::error::StoreError;
use crate::record::ImageRecord;
use crate::types::{ImageDescriptor, SlotKey};
use parking_lot::RwLock;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared handle on the store's generation counter
#[derive(Debug, Clone, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    /// Current generation
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Guard for work issued under `generation`
    #[inline]
    #[must_use]
    pub fn guard(&self, generation: u64) -> GenerationGuard {
        GenerationGuard {
            issued: generation,
            current: Arc::clone(&self.0),
        }
    }

    fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Snapshot of the generation a piece of work was issued under
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    issued: u64,
    current: Arc<AtomicU64>,
}

impl GenerationGuard {
    /// Generation at issue time
    #[inline]
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Whether no reset happened since issue
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.issued
    }
}

#[derive(Debug, Default)]
struct Page {
    tags: Option<String>,
    records: Vec<Arc<ImageRecord>>,
    pages_loaded: u32,
}

/// Result list for the active query
#[derive(Debug, Default)]
pub struct SearchResultStore {
    page: RwLock<Page>,
    epoch: Epoch,
}

impl SearchResultStore {
    /// Create empty store at generation 0
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all records and start a new generation for `tags`
    ///
    /// Returns the new generation.
    pub fn reset(&self, tags: &str) -> u64 {
        let mut page = self.page.write();
        page.records.clear();
        page.pages_loaded = 0;
        page.tags = Some(tags.to_string());
        let generation = self.epoch.advance();
        tracing::info!(generation, tags, "result store reset");
        generation
    }

    /// Append one page of descriptors in arrival order
    ///
    /// Duplicate URLs are kept; they are distinct photos. Returns the index
    /// range the new records occupy.
    pub fn append<I>(&self, descriptors: I) -> Range<usize>
    where
        I: IntoIterator<Item = ImageDescriptor>,
    {
        let mut page = self.page.write();
        let generation = self.epoch.current();
        let start = page.records.len();

        for descriptor in descriptors {
            let key = SlotKey::new(generation, page.records.len());
            page.records
                .push(Arc::new(ImageRecord::new(key, descriptor.name, descriptor.url)));
        }
        page.pages_loaded += 1;

        let end = page.records.len();
        tracing::debug!(generation, start, end, "appended page");
        start..end
    }

    /// Record at `index`
    ///
    /// # Errors
    /// `StoreError::OutOfRange` if `index >= len`.
    pub fn record_at(&self, index: usize) -> Result<Arc<ImageRecord>, StoreError> {
        let page = self.page.read();
        page.records
            .get(index)
            .cloned()
            .ok_or(StoreError::OutOfRange {
                index,
                len: page.records.len(),
            })
    }

    /// Snapshot of all records in display order
    #[must_use]
    pub fn records(&self) -> Vec<Arc<ImageRecord>> {
        self.page.read().records.clone()
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.epoch.current()
    }

    /// Guard bound to the current generation
    #[must_use]
    pub fn generation_guard(&self) -> GenerationGuard {
        self.epoch.guard(self.generation())
    }

    /// Handle for checking generations without borrowing the store
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch.clone()
    }

    /// Tags of the active query
    #[must_use]
    pub fn tags(&self) -> Option<String> {
        self.page.read().tags.clone()
    }

    /// Pages appended since the last reset
    #[inline]
    #[must_use]
    pub fn pages_loaded(&self) -> u32 {
        self.page.read().pages_loaded
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.page.read().records.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page.read().records.is_empty()
    }
}
