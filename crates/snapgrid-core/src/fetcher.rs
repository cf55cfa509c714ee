//! Image byte acquisition and decoding
//!
//! The transport is a trait so the core never depends on an HTTP stack;
//! `snapgrid-search` provides the reqwest implementation.

use crate::error::DownloadError;
use crate::record::DecodedImage;
use image::imageops::FilterType;

/// Fetches the raw bytes behind an image URL
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the full body at `url`
    ///
    /// # Errors
    /// `DownloadError::Fetch` on transport failure. An empty body is not an
    /// error here; the caller classifies it.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// Decode fetched bytes, optionally shrinking to a thumbnail edge
///
/// # Errors
/// - `DownloadError::EmptyPayload` for a zero-length body
/// - `DownloadError::Decode` if the bytes are not a supported image
pub fn decode_image(bytes: &[u8], thumbnail: Option<u32>) -> Result<DecodedImage, DownloadError> {
    if bytes.is_empty() {
        return Err(DownloadError::EmptyPayload);
    }

    let image = image::load_from_memory(bytes).map_err(DownloadError::decode)?;

    let image = match thumbnail {
        Some(edge) if image.width() > edge || image.height() > edge => {
            image.resize(edge, edge, FilterType::Lanczos3)
        }
        _ => image,
    };

    Ok(DecodedImage::new(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_valid_png() {
        let decoded = decode_image(&png(4, 3), None).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
    }

    #[test]
    fn decode_empty_is_empty_payload() {
        assert_eq!(decode_image(&[], None).unwrap_err(), DownloadError::EmptyPayload);
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let err = decode_image(b"definitely not an image", None).unwrap_err();
        assert!(matches!(err, DownloadError::Decode(_)));
    }

    #[test]
    fn thumbnail_preserves_aspect() {
        let decoded = decode_image(&png(64, 32), Some(16)).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }

    #[test]
    fn thumbnail_never_upscales() {
        let decoded = decode_image(&png(8, 8), Some(256)).unwrap();
        assert_eq!(decoded.width(), 8);
    }
}
