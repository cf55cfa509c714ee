//! Snapgrid Search - photo search collaborator
//!
//! Provides:
//! - The `SearchClient` contract used to page results into a grid
//! - A Flickr `flickr.photos.search` client with size-coded image URLs
//! - `HttpImageFetcher`, the reqwest transport behind downloads

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod client;
pub mod error;
pub mod flickr;
pub mod http_fetcher;

pub use client::{FlickrClient, SearchClient, SearchConfig, DEFAULT_ENDPOINT, DEFAULT_PER_PAGE};
pub use error::{SearchError, SearchResult};
pub use flickr::{parse_search_response, FlickrPhoto, PhotoPage, PhotoSize};
pub use http_fetcher::HttpImageFetcher;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
