//! Frame normalization shared by every provider.
//!
//! Oversized frames are scaled down so the longest side fits the configured
//! bound, keeping payloads and provider latency bounded.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, GenericImageView, ImageFormat, ImageResult};
use tracing::{debug, warn};

/// JPEG quality used when a frame has to be re-encoded.
pub const JPEG_QUALITY: u8 = 90;

/// Target size for an image of `width` x `height` whose longest side must not
/// exceed `max_side`.
pub fn scaled_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    if width <= max_side && height <= max_side {
        return (width, height);
    }
    if width > height {
        let h = (u64::from(height) * u64::from(max_side) / u64::from(width)) as u32;
        (max_side, h.max(1))
    } else {
        let w = (u64::from(width) * u64::from(max_side) / u64::from(height)) as u32;
        (w.max(1), max_side)
    }
}

/// Resize a single encoded frame if it exceeds `max_side`.
///
/// Frames that already fit, and frames that cannot be decoded, are returned
/// unchanged.
pub fn normalize_frame(frame: &Bytes, max_side: u32) -> Bytes {
    match resize_if_needed(frame, max_side) {
        Ok(Some(resized)) => Bytes::from(resized),
        Ok(None) => frame.clone(),
        Err(e) => {
            warn!(error = %e, bytes = frame.len(), "Frame normalization failed, sending original");
            frame.clone()
        }
    }
}

fn resize_if_needed(frame: &[u8], max_side: u32) -> ImageResult<Option<Vec<u8>>> {
    let image = image::load_from_memory(frame)?;
    let (width, height) = image.dimensions();
    let (new_width, new_height) = scaled_dimensions(width, height, max_side);
    if (new_width, new_height) == (width, height) {
        return Ok(None);
    }

    debug!(width, height, new_width, new_height, "Resizing frame");
    let resized = image
        .resize_exact(new_width, new_height, FilterType::Lanczos3)
        .to_rgb8();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY).encode(
        resized.as_raw(),
        new_width,
        new_height,
        ColorType::Rgb8,
    )?;
    Ok(Some(encoded))
}

/// MIME type for an encoded frame, defaulting to JPEG.
pub fn mime_type(frame: &[u8]) -> &'static str {
    match image::guess_format(frame) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        _ => "image/jpeg",
    }
}

/// Normalize every frame of a window off the async runtime.
pub async fn normalize_frames(frames: &[Bytes], max_side: u32) -> Vec<Bytes> {
    let owned = frames.to_vec();
    let fallback = owned.clone();
    match tokio::task::spawn_blocking(move || {
        owned
            .iter()
            .map(|frame| normalize_frame(frame, max_side))
            .collect::<Vec<_>>()
    })
    .await
    {
        Ok(normalized) => normalized,
        Err(e) => {
            warn!(error = %e, "Frame normalization task failed, sending originals");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Bytes {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb([120u8, 30, 200]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    #[test]
    fn test_scaled_dimensions_keep_aspect_ratio() {
        assert_eq!(scaled_dimensions(1600, 900, 768), (768, 432));
        assert_eq!(scaled_dimensions(900, 1600, 768), (432, 768));
        assert_eq!(scaled_dimensions(1000, 1000, 768), (768, 768));
        assert_eq!(scaled_dimensions(640, 480, 768), (640, 480));
        assert_eq!(scaled_dimensions(10_000, 1, 768), (768, 1));
    }

    #[test]
    fn test_large_frame_is_resized_to_bound() {
        let resized = normalize_frame(&png(1600, 900), 768);
        let decoded = image::load_from_memory(&resized).unwrap();
        assert_eq!(decoded.dimensions(), (768, 432));
    }

    #[test]
    fn test_small_frame_is_untouched() {
        let original = png(320, 240);
        assert_eq!(normalize_frame(&original, 768), original);
    }

    #[test]
    fn test_undecodable_frame_passes_through() {
        let garbage = Bytes::from_static(b"definitely not an image");
        assert_eq!(normalize_frame(&garbage, 768), garbage);
    }

    #[test]
    fn test_mime_type_detection() {
        assert_eq!(mime_type(&png(4, 4)), "image/png");
        assert_eq!(mime_type(&[0xff, 0xd8, 0xff, 0xe0]), "image/jpeg");
        assert_eq!(mime_type(b"unknown"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_normalize_frames_preserves_order() {
        let frames = vec![png(2000, 1000), Bytes::from_static(b"x"), png(100, 100)];
        let normalized = normalize_frames(&frames, 768).await;
        assert_eq!(normalized.len(), 3);
        assert_eq!(
            image::load_from_memory(&normalized[0]).unwrap().dimensions(),
            (768, 384)
        );
        assert_eq!(normalized[1], frames[1]);
        assert_eq!(normalized[2], frames[2]);
    }
}
