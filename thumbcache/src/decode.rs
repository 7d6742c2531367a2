//! Decoding encoded bytes into [`ImageBlob`]s.
//!
//! Large sources are downsampled by a power-of-two factor so the decoded
//! footprint stays close to what the consumer will display.

use crate::blob::{Dimensions, ImageBlob};
use crate::error::LoadError;
use image::imageops::FilterType;

/// Turns encoded bytes into a decoded image.
///
/// Called on the blocking pool.
pub trait Decoder: Send + Sync + 'static {
    /// Decode `bytes`, optionally downsampling toward `hint`.
    fn decode(&self, bytes: &[u8], hint: Option<Dimensions>) -> Result<ImageBlob, LoadError>;
}

/// Decoder for common raster formats (JPEG, PNG, GIF, WebP).
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl Decoder for RasterDecoder {
    fn decode(&self, bytes: &[u8], hint: Option<Dimensions>) -> Result<ImageBlob, LoadError> {
        let img = image::load_from_memory(bytes).map_err(|e| LoadError::Decode(e.to_string()))?;

        let sample = hint
            .map(|h| sample_size(Dimensions::new(img.width(), img.height()), h))
            .unwrap_or(1);
        let img = if sample > 1 {
            let width = (img.width() / sample).max(1);
            let height = (img.height() / sample).max(1);
            img.resize_exact(width, height, FilterType::Triangle)
        } else {
            img
        };

        let rgba = img.into_rgba8();
        let (width, height) = rgba.dimensions();
        ImageBlob::from_rgba(width, height, rgba.into_raw())
            .ok_or_else(|| LoadError::Decode("decoded buffer has unexpected length".to_string()))
    }
}

/// Largest power-of-two divisor that keeps both sides at or above `requested`.
///
/// Returns 1 when the source already fits.
pub fn sample_size(source: Dimensions, requested: Dimensions) -> u32 {
    let mut sample = 1u32;
    if source.height > requested.height || source.width > requested.width {
        let half_height = source.height / 2;
        let half_width = source.width / 2;
        while half_height / sample >= requested.height.max(1)
            && half_width / sample >= requested.width.max(1)
        {
            sample *= 2;
        }
    }
    sample
}
