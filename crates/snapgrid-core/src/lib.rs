//! Snapgrid Core - image acquisition for a scrolling photo grid
//!
//! Turns a list of remote photos into on-demand, cancellable downloads:
//! - Per-record state machine (`New -> Downloading -> Downloaded | Failed`)
//! - At most one in-flight download per slot, on a bounded worker pool
//! - Cooperative cancellation when a slot is recycled or the query changes
//! - One update per finished download, delivered over a channel
//!
//! # Example
//!
//! ```rust,ignore
//! use snapgrid_core::{GridConfig, GridSession, ImageDescriptor};
//!
//! # async fn example(fetcher: std::sync::Arc<dyn snapgrid_core::ImageFetcher>) -> snapgrid_core::GridResult<()> {
//! let (session, mut updates) = GridSession::new(fetcher, GridConfig::new())?;
//!
//! session.begin_search("cats");
//! session.append_page(vec![ImageDescriptor::new("a", "http://x/a.jpg")]);
//! session.on_visible(0)?;
//!
//! while let Some(update) = updates.recv().await {
//!     println!("{} is now {:?}", update.key, update.state);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod record;
pub mod registry;
pub mod service;
pub mod session;
pub mod store;
pub mod task;
pub mod types;

// Re-exports for convenience
pub use cache::ImageCache;
pub use error::{
    DownloadError, GridError, GridResult, PoolError, StoreError, TransitionError,
};
pub use fetcher::{decode_image, ImageFetcher};
pub use record::{
    allowed_transitions, validate_transition, DecodedImage, ImageRecord, Payload, RecordState,
};
pub use registry::{CancellationFlag, PendingOperations, RegistryStats, TaskTicket, WorkerPool};
pub use service::{ImageFetchService, SlotUpdate, SlotUpdates};
pub use session::GridSession;
pub use store::{Epoch, GenerationGuard, SearchResultStore};
pub use task::{DownloadSettings, DownloadTask, TaskOutcome};
pub use types::{GridConfig, ImageDescriptor, SlotKey, TaskId};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Snapgrid Core
    pub use crate::{
        DownloadError, GridConfig, GridResult, GridSession, ImageDescriptor, ImageFetcher,
        Payload, RecordState, SlotKey, SlotUpdate, SlotUpdates,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
