//! Grid session: store and fetch service with one lifecycle
//!
//! The presentation layer talks to the grid through this type only. Slots
//! are addressed by display index; the session maps them onto keys of the
//! current generation.

use crate::error::{GridResult, StoreError};
use crate::fetcher::ImageFetcher;
use crate::record::{ImageRecord, Payload};
use crate::service::{ImageFetchService, SlotUpdates};
use crate::store::SearchResultStore;
use crate::types::{GridConfig, ImageDescriptor, SlotKey};
use std::ops::Range;
use std::sync::Arc;

/// Owns the result store and the fetch service for one grid
///
/// Dropping the session cancels all in-flight downloads.
#[derive(Debug)]
pub struct GridSession {
    store: SearchResultStore,
    service: ImageFetchService,
    config: GridConfig,
}

impl GridSession {
    /// Create session on the current tokio runtime
    ///
    /// # Errors
    /// `GridError::Pool` outside a runtime or with a zero concurrency bound.
    pub fn new(fetcher: Arc<dyn ImageFetcher>, config: GridConfig) -> GridResult<(Self, SlotUpdates)> {
        let store = SearchResultStore::new();
        let (service, updates) = ImageFetchService::new(fetcher, &config, store.epoch())?;
        Ok((
            Self {
                store,
                service,
                config,
            },
            updates,
        ))
    }

    /// Start a new query; everything from the previous one is cancelled
    ///
    /// Returns the new generation.
    pub fn begin_search(&self, tags: &str) -> u64 {
        let cancelled = self.service.cancel_all();
        let generation = self.store.reset(tags);
        tracing::info!(generation, tags, cancelled, "search started");
        generation
    }

    /// Append the next page of results
    pub fn append_page(&self, descriptors: Vec<ImageDescriptor>) -> Range<usize> {
        self.store.append(descriptors)
    }

    /// Slot `index` became visible; fetch its image if it has none yet
    ///
    /// # Errors
    /// `StoreError::OutOfRange` for an index past the end.
    pub fn on_visible(&self, index: usize) -> Result<bool, StoreError> {
        let record = self.store.record_at(index)?;
        Ok(self.service.ensure_fetch(record.id(), &record))
    }

    /// Slot `index` was recycled; drop its pending download
    pub fn on_recycled(&self, index: usize) -> bool {
        self.service
            .cancel_visible(SlotKey::new(self.store.generation(), index))
    }

    /// Explicit retry of a failed slot
    ///
    /// # Errors
    /// - `GridError::Store` for an index past the end
    /// - `GridError::Transition` if the record is not `Failed`
    pub fn retry(&self, index: usize) -> GridResult<bool> {
        let record = self.store.record_at(index)?;
        record.reset_for_retry()?;
        tracing::debug!(key = %record.id(), "retrying download");
        Ok(self.service.ensure_fetch(record.id(), &record))
    }

    /// Whether the grid is close enough to the end to load another page
    #[must_use]
    pub fn wants_more(&self, last_visible: usize) -> bool {
        let len = self.store.len();
        len > 0 && last_visible.saturating_add(self.config.prefetch_threshold) >= len
    }

    /// Record at `index`
    ///
    /// # Errors
    /// `StoreError::OutOfRange` for an index past the end.
    pub fn record_at(&self, index: usize) -> Result<Arc<ImageRecord>, StoreError> {
        self.store.record_at(index)
    }

    /// Payload for the detail view of slot `index`
    ///
    /// # Errors
    /// `StoreError::OutOfRange` for an index past the end.
    pub fn payload_at(&self, index: usize) -> Result<Option<Payload>, StoreError> {
        Ok(self.store.record_at(index)?.payload())
    }

    /// Number of results
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if there are no results
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// Downloads in flight
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.service.in_flight()
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Result store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &SearchResultStore {
        &self.store
    }

    /// Fetch service
    #[inline]
    #[must_use]
    pub fn service(&self) -> &ImageFetchService {
        &self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DownloadError, GridError, TransitionError};
    use crate::record::RecordState;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Fails until `healthy` is set, then returns bytes that are not an image
    #[derive(Default)]
    struct FlakyFetcher {
        healthy: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ImageFetcher for FlakyFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, DownloadError> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(b"not an image".to_vec())
            } else {
                Err(DownloadError::fetch("connection reset"))
            }
        }
    }

    fn page(n: usize) -> Vec<ImageDescriptor> {
        (0..n)
            .map(|i| ImageDescriptor::new(format!("p{i}"), format!("http://x/{i}.jpg")))
            .collect()
    }

    fn session(config: GridConfig) -> (GridSession, SlotUpdates, Arc<FlakyFetcher>) {
        let fetcher = Arc::new(FlakyFetcher::default());
        let (session, updates) = GridSession::new(Arc::clone(&fetcher) as Arc<dyn ImageFetcher>, config).unwrap();
        (session, updates, fetcher)
    }

    async fn next(updates: &mut SlotUpdates) -> crate::service::SlotUpdate {
        tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn session_requires_runtime() {
        let result = GridSession::new(Arc::new(FlakyFetcher::default()), GridConfig::default());
        assert!(matches!(result, Err(GridError::Pool(_))));
    }

    #[tokio::test]
    async fn on_visible_out_of_range() {
        let (session, _updates, _) = session(GridConfig::default());
        session.append_page(page(2));
        assert_eq!(
            session.on_visible(2).unwrap_err(),
            StoreError::OutOfRange { index: 2, len: 2 }
        );
    }

    #[tokio::test]
    async fn failed_slot_stays_failed_until_retry() {
        let (session, mut updates, fetcher) = session(GridConfig::default());
        session.begin_search("cats");
        session.append_page(page(1));

        assert!(session.on_visible(0).unwrap());
        assert_eq!(next(&mut updates).await.state, RecordState::Failed);
        assert!(session.payload_at(0).unwrap().unwrap().is_broken());

        // Visibility alone never retries.
        assert!(!session.on_visible(0).unwrap());

        fetcher.healthy.store(true, Ordering::SeqCst);
        assert!(session.retry(0).unwrap());
        assert_eq!(next(&mut updates).await.state, RecordState::Failed);
        assert!(matches!(
            session.record_at(0).unwrap().failure(),
            Some(DownloadError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn retry_requires_failed_record() {
        let (session, _updates, _) = session(GridConfig::default());
        session.append_page(page(1));

        let err = session.retry(0).unwrap_err();
        assert!(matches!(
            err,
            GridError::Transition(TransitionError::Illegal {
                from: RecordState::New,
                to: RecordState::New
            })
        ));
    }

    #[tokio::test]
    async fn begin_search_empties_results() {
        let (session, _updates, _) = session(GridConfig::default());
        session.begin_search("cats");
        session.append_page(page(3));

        let generation = session.begin_search("dogs");
        assert_eq!(generation, session.generation());
        assert!(session.is_empty());
        assert_eq!(session.store().tags().as_deref(), Some("dogs"));
        assert_eq!(session.in_flight(), 0);
    }

    #[tokio::test]
    async fn wants_more_near_the_end() {
        let (session, _updates, _) = session(GridConfig::default().with_prefetch_threshold(10));
        assert!(!session.wants_more(0));

        session.append_page(page(50));
        assert!(!session.wants_more(20));
        assert!(!session.wants_more(39));
        assert!(session.wants_more(40));
        assert!(session.wants_more(49));
    }

    #[tokio::test]
    async fn recycling_idle_slot_is_noop() {
        let (session, _updates, _) = session(GridConfig::default());
        session.append_page(page(1));
        assert!(!session.on_recycled(0));
        assert!(!session.on_recycled(99));
    }
}
