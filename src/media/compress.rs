//! Downscale-and-JPEG for images that have to be inlined.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageFormat};

use crate::error::MediaError;

/// Decode `bytes`, shrink so neither side exceeds `max_dimension`, and
/// re-encode as JPEG at `quality` (1–100).
///
/// Images already within bounds are re-encoded at their own size; nothing is
/// ever upscaled.
pub fn compress_image(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<Vec<u8>, MediaError> {
    let image = image::load_from_memory(bytes).map_err(MediaError::Decode)?;
    let image = fit_within(image, max_dimension.max(1));

    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(MediaError::Encode)?;
    Ok(out.into_inner())
}

/// Whether this build has a decoder for the format of `bytes`.
///
/// The format is sniffed from the bytes, then taken from `mime_type`. Bytes
/// whose format cannot be told at all count as decodable, so that corrupt
/// input still reaches the decoder and fails there.
pub fn has_decoder(bytes: &[u8], mime_type: &str) -> bool {
    image::guess_format(bytes)
        .ok()
        .or_else(|| ImageFormat::from_mime_type(mime_type))
        .map_or(true, |format| format.reading_enabled())
}

/// Target size for a `width`×`height` image bounded by `max` on its longer side.
pub fn fitted_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max {
        return (width, height);
    }
    let scale = |side: u32| -> u32 {
        let scaled = (u64::from(side) * u64::from(max) + u64::from(longer) / 2) / u64::from(longer);
        (scaled as u32).max(1)
    };
    (scale(width), scale(height))
}

fn fit_within(image: DynamicImage, max: u32) -> DynamicImage {
    let (width, height) = fitted_dimensions(image.width(), image.height(), max);
    if (width, height) == (image.width(), image.height()) {
        return image;
    }
    image.resize_exact(width, height, FilterType::Triangle)
}
