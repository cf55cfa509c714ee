//! Flickr photo search wire model
//!
//! Response envelope, photo records and the static-image URL template.

use crate::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use snapgrid_core::ImageDescriptor;
use std::str::FromStr;

/// Host-side image sizes, by Flickr size code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhotoSize {
    #[serde(rename = "o")]
    Original,
    #[serde(rename = "k")]
    Large2048,
    #[serde(rename = "h")]
    Large1600,
    #[default]
    #[serde(rename = "b")]
    Large1024,
    #[serde(rename = "c")]
    Medium800,
    #[serde(rename = "z")]
    Medium640,
    #[serde(rename = "-")]
    Medium500,
    #[serde(rename = "n")]
    Small320,
    #[serde(rename = "m")]
    Small240,
    #[serde(rename = "t")]
    Thumbnail100,
    #[serde(rename = "q")]
    LargeSquare150,
    #[serde(rename = "s")]
    Square75,
}

impl PhotoSize {
    /// Every size, largest first
    pub const ALL: [Self; 12] = [
        Self::Original,
        Self::Large2048,
        Self::Large1600,
        Self::Large1024,
        Self::Medium800,
        Self::Medium640,
        Self::Medium500,
        Self::Small320,
        Self::Small240,
        Self::Thumbnail100,
        Self::LargeSquare150,
        Self::Square75,
    ];

    /// Flickr size code
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Original => "o",
            Self::Large2048 => "k",
            Self::Large1600 => "h",
            Self::Large1024 => "b",
            Self::Medium800 => "c",
            Self::Medium640 => "z",
            Self::Medium500 => "-",
            Self::Small320 => "n",
            Self::Small240 => "m",
            Self::Thumbnail100 => "t",
            Self::LargeSquare150 => "q",
            Self::Square75 => "s",
        }
    }

    /// File name suffix; the 500px size has none
    #[must_use]
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Medium500 => None,
            other => Some(other.code()),
        }
    }
}

impl FromStr for PhotoSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.code() == s)
            .ok_or_else(|| format!("unknown photo size code: {s}"))
    }
}

impl std::fmt::Display for PhotoSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One entry of `photos.photo[]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlickrPhoto {
    pub id: String,
    pub secret: String,
    pub server: String,
    pub farm: u32,
    #[serde(default)]
    pub title: String,
}

impl FlickrPhoto {
    /// Static image URL at `size`
    #[must_use]
    pub fn image_url(&self, size: PhotoSize) -> String {
        let suffix = size.suffix().map(|code| format!("_{code}")).unwrap_or_default();
        format!(
            "https://farm{}.staticflickr.com/{}/{}_{}{}.jpg",
            self.farm, self.server, self.id, self.secret, suffix
        )
    }

    /// Descriptor for the result store
    #[must_use]
    pub fn descriptor(&self, size: PhotoSize) -> ImageDescriptor {
        ImageDescriptor::new(self.title.clone(), self.image_url(size))
    }
}

/// `photos` object of a successful response
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoPage {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub photo: Vec<FlickrPhoto>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "stat", rename_all = "lowercase")]
enum Envelope {
    Ok { photos: PhotoPage },
    Fail { code: i64, message: String },
}

/// Parse a `flickr.photos.search` JSON body
///
/// # Errors
/// - `SearchError::Api` for a `stat: fail` envelope
/// - `SearchError::Parse` for anything that is not a search envelope
pub fn parse_search_response(body: &str) -> SearchResult<PhotoPage> {
    match serde_json::from_str::<Envelope>(body).map_err(SearchError::parse)? {
        Envelope::Ok { photos } => Ok(photos),
        Envelope::Fail { code, message } => Err(SearchError::Api { code, message }),
    }
}
