//! Image records and their download state machine
//!
//! A record moves `New -> Downloading -> {Downloaded, Failed}`. Two
//! backward edges exist: `Downloading -> New` when the owning task is
//! cancelled before it mutates anything, and `Failed -> New` on an explicit
//! retry. `Downloaded` is terminal.

use crate::error::{DownloadError, TransitionError};
use crate::types::SlotKey;
use image::DynamicImage;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Download state of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordState {
    /// Not requested yet (or returned after a cancelled attempt)
    New,
    /// A task owns the record and is fetching
    Downloading,
    /// Bytes fetched and decoded
    Downloaded,
    /// Fetch or decode failed; carries the broken placeholder
    Failed,
}

impl RecordState {
    /// Whether a payload accompanies this state
    #[inline]
    #[must_use]
    pub fn has_payload(self) -> bool {
        matches!(self, Self::Downloaded | Self::Failed)
    }
}

/// Validates a record state transition.
pub fn validate_transition(from: RecordState, to: RecordState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError::Illegal { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: RecordState) -> Vec<RecordState> {
    use RecordState::*;
    match from {
        New => vec![Downloading],
        Downloading => vec![Downloaded, Failed, New],
        Downloaded => vec![],
        Failed => vec![New],
    }
}

/// A decoded image ready for display
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    /// Wrap a decoded image
    #[inline]
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Pixel width
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Pixel height
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Underlying image
    #[inline]
    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// What a finished record shows
#[derive(Debug, Clone)]
pub enum Payload {
    /// The decoded photo
    Image(Arc<DecodedImage>),
    /// Fixed fallback shown for failed downloads
    Broken,
}

impl Payload {
    /// Check for the broken placeholder
    #[inline]
    #[must_use]
    pub fn is_broken(&self) -> bool {
        matches!(self, Self::Broken)
    }

    /// Decoded image, if this is not the placeholder
    #[inline]
    #[must_use]
    pub fn image(&self) -> Option<&Arc<DecodedImage>> {
        match self {
            Self::Image(image) => Some(image),
            Self::Broken => None,
        }
    }
}

/// State and payload stored together so neither is observed without the other
#[derive(Debug, Clone)]
enum Progress {
    New,
    Downloading,
    Downloaded(Arc<DecodedImage>),
    Failed(DownloadError),
}

impl Progress {
    fn state(&self) -> RecordState {
        match self {
            Self::New => RecordState::New,
            Self::Downloading => RecordState::Downloading,
            Self::Downloaded(_) => RecordState::Downloaded,
            Self::Failed(_) => RecordState::Failed,
        }
    }
}

/// One remote photo in the result list
#[derive(Debug)]
pub struct ImageRecord {
    id: SlotKey,
    name: String,
    source_url: String,
    progress: RwLock<Progress>,
}

impl ImageRecord {
    /// Create a record in the `New` state
    #[must_use]
    pub fn new(id: SlotKey, name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            source_url: source_url.into(),
            progress: RwLock::new(Progress::New),
        }
    }

    /// Stable identity within the query generation
    #[inline]
    #[must_use]
    pub fn id(&self) -> SlotKey {
        self.id
    }

    /// Display label
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the image bytes
    #[inline]
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Current download state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RecordState {
        self.progress.read().state()
    }

    /// Payload; present only when `Downloaded` or `Failed`
    #[must_use]
    pub fn payload(&self) -> Option<Payload> {
        match &*self.progress.read() {
            Progress::Downloaded(image) => Some(Payload::Image(Arc::clone(image))),
            Progress::Failed(_) => Some(Payload::Broken),
            Progress::New | Progress::Downloading => None,
        }
    }

    /// Reason for the last failure, if the record is `Failed`
    #[must_use]
    pub fn failure(&self) -> Option<DownloadError> {
        match &*self.progress.read() {
            Progress::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Claim the record for a download (`New -> Downloading`)
    ///
    /// # Errors
    /// `TransitionError::Illegal` if the record is not `New`; the caller lost
    /// the race or the record already finished.
    pub fn begin_download(&self) -> Result<(), TransitionError> {
        self.transition(Progress::Downloading, None)
    }

    /// Store the decoded image (`Downloading -> Downloaded`)
    ///
    /// # Errors
    /// `TransitionError::Illegal` if the record is not `Downloading`.
    pub fn complete(&self, image: Arc<DecodedImage>) -> Result<(), TransitionError> {
        self.transition(Progress::Downloaded(image), None)
    }

    /// Record a terminal failure (`Downloading -> Failed`)
    ///
    /// # Errors
    /// `TransitionError::Illegal` if the record is not `Downloading`.
    pub fn fail(&self, error: DownloadError) -> Result<(), TransitionError> {
        self.transition(Progress::Failed(error), None)
    }

    /// Give the record back after a cancelled attempt (`Downloading -> New`)
    ///
    /// # Errors
    /// `TransitionError::Illegal` if the record is not `Downloading`.
    pub fn abandon(&self) -> Result<(), TransitionError> {
        self.transition(Progress::New, Some(RecordState::Downloading))
    }

    /// Explicit user retry (`Failed -> New`)
    ///
    /// # Errors
    /// `TransitionError::Illegal` if the record is not `Failed`.
    pub fn reset_for_retry(&self) -> Result<(), TransitionError> {
        self.transition(Progress::New, Some(RecordState::Failed))
    }

    fn transition(&self, next: Progress, required: Option<RecordState>) -> Result<(), TransitionError> {
        let mut progress = self.progress.write();
        let from = progress.state();
        let to = next.state();
        if required.is_some_and(|state| state != from) {
            return Err(TransitionError::Illegal { from, to });
        }
        validate_transition(from, to)?;
        *progress = next;
        Ok(())
    }
}
