//! Image fetch service
//!
//! Bridges slot visibility to download scheduling:
//! - `ensure_fetch` claims a `New` record and starts exactly one task for it
//! - `cancel_visible` drops work for a slot that left the screen
//! - Every non-cancelled completion is published once on the update channel
//!
//! The receiving half of the channel is the coordinating context: it sees
//! slot updates one at a time, in completion order.

use crate::cache::ImageCache;
use crate::error::GridError;
use crate::fetcher::ImageFetcher;
use crate::record::{ImageRecord, RecordState};
use crate::registry::{PendingOperations, RegistryStats, WorkerPool};
use crate::store::Epoch;
use crate::task::{DownloadSettings, DownloadTask};
use crate::types::{GridConfig, SlotKey};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A slot whose record reached a new resting state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotUpdate {
    /// Slot that changed
    pub key: SlotKey,
    /// `Downloaded` or `Failed`
    pub state: RecordState,
}

/// Receiving end of the slot update channel
#[derive(Debug)]
pub struct SlotUpdates {
    rx: mpsc::UnboundedReceiver<SlotUpdate>,
}

impl SlotUpdates {
    /// Wait for the next update
    ///
    /// Returns `None` once the service and all of its tasks are gone.
    pub async fn recv(&mut self) -> Option<SlotUpdate> {
        self.rx.recv().await
    }

    /// Take an update if one is ready
    pub fn try_recv(&mut self) -> Option<SlotUpdate> {
        self.rx.try_recv().ok()
    }
}

/// Schedules downloads for visible slots
pub struct ImageFetchService {
    registry: PendingOperations<SlotKey>,
    settings: DownloadSettings,
    epoch: Epoch,
    updates: mpsc::UnboundedSender<SlotUpdate>,
}

impl ImageFetchService {
    /// Create service on the current tokio runtime
    ///
    /// # Errors
    /// `GridError::Pool` outside a runtime or with a zero concurrency bound.
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        config: &GridConfig,
        epoch: Epoch,
    ) -> Result<(Self, SlotUpdates), GridError> {
        let pool = WorkerPool::new(config.max_concurrent_fetches)?;
        Ok(Self::with_pool(fetcher, config, epoch, pool))
    }

    /// Create service on an explicit worker pool
    #[must_use]
    pub fn with_pool(
        fetcher: Arc<dyn ImageFetcher>,
        config: &GridConfig,
        epoch: Epoch,
        pool: WorkerPool,
    ) -> (Self, SlotUpdates) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = DownloadSettings {
            fetcher,
            cache: ImageCache::new(config.cache_capacity),
            timeout: config.fetch_timeout(),
            thumbnail: config.thumbnail_size,
        };

        let service = Self {
            registry: PendingOperations::new(pool),
            settings,
            epoch,
            updates: tx,
        };
        (service, SlotUpdates { rx })
    }

    /// Make sure the record shown in `key` is being fetched
    ///
    /// Only a `New` record from the current generation starts a task; any
    /// other state is left alone, so calling this on every visibility check
    /// is safe. Returns whether a task was started.
    pub fn ensure_fetch(&self, key: SlotKey, record: &Arc<ImageRecord>) -> bool {
        if record.state() != RecordState::New {
            return false;
        }

        let generation = self.epoch.guard(record.id().generation);
        if !generation.is_current() {
            tracing::debug!(%key, "record from a previous generation; not fetching");
            return false;
        }

        if record.begin_download().is_err() {
            return false;
        }

        let task_record = Arc::clone(record);
        let settings = self.settings.clone();
        let registry = self.registry.clone();
        let updates = self.updates.clone();

        let started = self.registry.try_start(key, move |ticket| {
            let task = DownloadTask::new(task_record, ticket, generation, settings).on_complete(
                move |task_id, outcome| {
                    let owned = registry.complete_and_remove(&key, task_id);
                    match (owned, outcome.state()) {
                        (true, Some(state)) => {
                            // Receiver gone means nobody is rendering; nothing to do.
                            let _ = updates.send(SlotUpdate { key, state });
                        }
                        (false, Some(_)) => {
                            tracing::debug!(%key, "slot recycled before completion; update suppressed");
                        }
                        (_, None) => {}
                    }
                },
            );
            async move {
                task.run().await;
            }
        });

        if !started {
            // Key busy with another record's task.
            let _ = record.abandon();
        }
        started
    }

    /// Stop caring about `key` (e.g. its view was recycled)
    pub fn cancel_visible(&self, key: SlotKey) -> bool {
        self.registry.cancel_and_remove(&key)
    }

    /// Cancel every in-flight download
    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    /// Whether `key` has a download in flight
    #[inline]
    #[must_use]
    pub fn is_pending(&self, key: SlotKey) -> bool {
        self.registry.contains(&key)
    }

    /// Number of downloads in flight
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    /// Registry statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// Underlying registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &PendingOperations<SlotKey> {
        &self.registry
    }

    /// Concurrency bound of the worker pool
    #[inline]
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.registry.pool().capacity()
    }

    /// Decoded-image cache, if enabled
    #[inline]
    #[must_use]
    pub fn cache(&self) -> Option<&ImageCache> {
        self.settings.cache.as_ref()
    }
}

impl Drop for ImageFetchService {
    fn drop(&mut self) {
        self.registry.cancel_all();
    }
}

impl std::fmt::Debug for ImageFetchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFetchService")
            .field("in_flight", &self.registry.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
