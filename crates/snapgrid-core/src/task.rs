//! Download task: fetch, decode and publish one record's image
//!
//! Cancellation is cooperative and checked at exactly two points:
//! 1. On entry, once the task holds a worker permit
//! 2. After fetch and decode, immediately before mutating the record or
//!    the shared cache
//!
//! A task past the second checkpoint finishes normally even if cancelled in
//! the meantime; the registry absorbs that completion as stale. A task whose
//! generation was reset away counts as cancelled at either checkpoint and
//! never touches its record.

use crate::cache::ImageCache;
use crate::error::DownloadError;
use crate::fetcher::{decode_image, ImageFetcher};
use crate::record::{DecodedImage, ImageRecord, RecordState};
use crate::registry::TaskTicket;
use crate::store::GenerationGuard;
use crate::types::TaskId;
use std::sync::Arc;
use std::time::Duration;

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Record moved to `Downloaded`
    Downloaded,
    /// Record moved to `Failed`
    Failed(DownloadError),
    /// Task stopped at a checkpoint; the outcome must not be acted upon
    Cancelled,
}

impl TaskOutcome {
    /// Check for the cancelled signal
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Record state this outcome left behind, if any
    #[inline]
    #[must_use]
    pub fn state(&self) -> Option<RecordState> {
        match self {
            Self::Downloaded => Some(RecordState::Downloaded),
            Self::Failed(_) => Some(RecordState::Failed),
            Self::Cancelled => None,
        }
    }
}

type Completion = Box<dyn FnOnce(TaskId, &TaskOutcome) + Send>;

/// Fetch settings shared by every task of a service
#[derive(Clone)]
pub struct DownloadSettings {
    /// Byte transport
    pub fetcher: Arc<dyn ImageFetcher>,
    /// Decoded-image cache, if enabled
    pub cache: Option<ImageCache>,
    /// Deadline for one fetch
    pub timeout: Duration,
    /// Longest edge after decoding
    pub thumbnail: Option<u32>,
}

impl std::fmt::Debug for DownloadSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSettings")
            .field("cache", &self.cache.is_some())
            .field("timeout", &self.timeout)
            .field("thumbnail", &self.thumbnail)
            .finish_non_exhaustive()
    }
}

/// One unit of download work for one record
pub struct DownloadTask {
    job: Job,
    on_complete: Option<Completion>,
}

/// Everything the task reads while running; shared across await points
struct Job {
    record: Arc<ImageRecord>,
    ticket: TaskTicket,
    generation: GenerationGuard,
    settings: DownloadSettings,
}

impl DownloadTask {
    /// Create task for `record`
    ///
    /// The record is expected to be `Downloading` already; the caller
    /// claimed it before scheduling.
    #[must_use]
    pub fn new(
        record: Arc<ImageRecord>,
        ticket: TaskTicket,
        generation: GenerationGuard,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            job: Job {
                record,
                ticket,
                generation,
                settings,
            },
            on_complete: None,
        }
    }

    /// Completion callback, invoked exactly once with the task id and outcome
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(TaskId, &TaskOutcome) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Task identity
    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.job.ticket.id()
    }

    /// Run to completion and notify
    pub async fn run(self) -> TaskOutcome {
        let Self { job, on_complete } = self;
        let outcome = job.execute().await;
        if let Some(callback) = on_complete {
            callback(job.ticket.id(), &outcome);
        }
        outcome
    }
}

impl Job {
    async fn execute(&self) -> TaskOutcome {
        if self.should_stop() {
            return self.stop();
        }

        let result = self.acquire().await;

        if self.should_stop() {
            return self.stop();
        }

        let url = self.record.source_url();
        match result {
            Ok((image, cached)) => {
                if let (Some(cache), false) = (&self.settings.cache, cached) {
                    cache.insert(url, Arc::clone(&image)).await;
                }
                match self.record.complete(image) {
                    Ok(()) => TaskOutcome::Downloaded,
                    Err(err) => {
                        tracing::debug!(url, %err, "record changed under task; result dropped");
                        TaskOutcome::Cancelled
                    }
                }
            }
            Err(error) => {
                tracing::warn!(url, %error, "image download failed");
                match self.record.fail(error.clone()) {
                    Ok(()) => TaskOutcome::Failed(error),
                    Err(err) => {
                        tracing::debug!(url, %err, "record changed under task; failure dropped");
                        TaskOutcome::Cancelled
                    }
                }
            }
        }
    }

    /// Cache lookup, then fetch with deadline and decode off the async workers
    ///
    /// Read-only: the flag says whether the image came from the cache. A
    /// fresh image is cached by `execute` once the second checkpoint passes.
    async fn acquire(&self) -> Result<(Arc<DecodedImage>, bool), DownloadError> {
        let url = self.record.source_url();

        if let Some(cache) = &self.settings.cache {
            if let Some(image) = cache.get(url).await {
                tracing::debug!(url, "decoded image served from cache");
                return Ok((image, true));
            }
        }

        let bytes = tokio::time::timeout(self.settings.timeout, self.settings.fetcher.fetch(url))
            .await
            .map_err(|_| DownloadError::Timeout {
                secs: self.settings.timeout.as_secs(),
            })??;

        let thumbnail = self.settings.thumbnail;
        let image = tokio::task::spawn_blocking(move || decode_image(&bytes, thumbnail))
            .await
            .map_err(|e| DownloadError::decode(format!("decode task join error: {e}")))??;
        Ok((Arc::new(image), false))
    }

    fn should_stop(&self) -> bool {
        self.ticket.cancellation().is_cancelled() || !self.generation.is_current()
    }

    /// Leave through a checkpoint
    fn stop(&self) -> TaskOutcome {
        // A stale generation no longer owns its record.
        if self.generation.is_current() {
            if let Err(err) = self.record.abandon() {
                tracing::debug!(task = %self.ticket.id(), %err, "cancelled task left record as is");
            }
        }
        TaskOutcome::Cancelled
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("record", &self.job.record.id())
            .field("task", &self.job.ticket.id())
            .field("generation", &self.job.generation.issued())
            .finish_non_exhaustive()
    }
}
