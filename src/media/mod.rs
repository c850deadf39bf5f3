// SPDX-License-Identifier: GPL-3.0-only

//! Image decode backend
//!
//! Scaled decoding is two-pass: a cheap bounds probe first, then a real
//! decode reduced by a power-of-two factor chosen from the probed size.
//! The cache never needs a full-resolution bitmap in memory.

use image::{ImageEncoder, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Decoding backend consumed by the bitmap cache
///
/// All failures are reported as `None`; a bitmap that cannot be decoded
/// is simply not available.
pub trait BitmapDecoder: Send + Sync {
    /// Intrinsic dimensions of an encoded image, without a full decode
    fn probe_dimensions(&self, bytes: &[u8]) -> Option<(u32, u32)>;

    /// Decode, reduced by `factor` in both dimensions (`factor >= 1`)
    fn decode_downsampled(&self, bytes: &[u8], factor: u32) -> Option<RgbaImage>;
}

/// Largest power-of-two downsample factor that keeps both output
/// dimensions at or above the requested minimums
pub fn downsample_factor(src_width: u32, src_height: u32, min_width: u32, min_height: u32) -> u32 {
    let min_width = min_width.max(1);
    let min_height = min_height.max(1);
    let mut factor = 1u32;
    while src_width / (factor * 2) >= min_width && src_height / (factor * 2) >= min_height {
        factor *= 2;
    }
    factor
}

/// [`BitmapDecoder`] backed by the `image` crate
pub struct ImageBitmapDecoder;

impl BitmapDecoder for ImageBitmapDecoder {
    fn probe_dimensions(&self, bytes: &[u8]) -> Option<(u32, u32)> {
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    fn decode_downsampled(&self, bytes: &[u8], factor: u32) -> Option<RgbaImage> {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                debug!(error = %e, "bitmap decode failed");
                return None;
            }
        };
        let factor = factor.max(1);
        if factor == 1 {
            return Some(decoded);
        }
        let width = decoded.width() / factor;
        let height = decoded.height() / factor;
        if width == 0 || height == 0 {
            return Some(decoded);
        }
        Some(image::imageops::resize(
            &decoded,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}

/// Encode a bitmap as JPEG for thumbnail persistence.
///
/// JPEG carries no alpha channel, so pixels are flattened to RGB first.
pub fn encode_jpeg(bitmap: &RgbaImage, quality: u8) -> Option<Vec<u8>> {
    let rgb = image::DynamicImage::ImageRgba8(bitmap.clone()).to_rgb8();
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    match encoder.write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    ) {
        Ok(()) => Some(out),
        Err(e) => {
            debug!(error = %e, "thumbnail encode failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_factor_is_power_of_two() {
        assert_eq!(downsample_factor(800, 600, 100, 100), 4);
        assert_eq!(downsample_factor(1920, 1080, 256, 256), 4);
        assert_eq!(downsample_factor(4096, 4096, 64, 64), 64);
    }

    #[test]
    fn test_downsample_factor_keeps_minimums() {
        let factor = downsample_factor(800, 600, 100, 100);
        assert!(800 / factor >= 100);
        assert!(600 / factor >= 100);
        // one more halving would violate the height minimum
        assert!(600 / (factor * 2) < 100);
    }

    #[test]
    fn test_downsample_factor_small_source() {
        assert_eq!(downsample_factor(64, 64, 100, 100), 1);
        assert_eq!(downsample_factor(100, 100, 100, 100), 1);
    }

    #[test]
    fn test_downsample_factor_zero_minimums() {
        // degenerate request treated as 1x1
        assert_eq!(downsample_factor(256, 256, 0, 0), 256);
    }

    #[test]
    fn test_probe_matches_encoded_dimensions() {
        let bitmap = RgbaImage::from_pixel(320, 200, image::Rgba([12, 34, 56, 255]));
        let jpeg = encode_jpeg(&bitmap, 90).expect("encode");
        let decoder = ImageBitmapDecoder;
        assert_eq!(decoder.probe_dimensions(&jpeg), Some((320, 200)));
    }

    #[test]
    fn test_decode_downsampled_halves_dimensions() {
        let bitmap = RgbaImage::from_pixel(320, 200, image::Rgba([200, 100, 50, 255]));
        let jpeg = encode_jpeg(&bitmap, 90).expect("encode");
        let decoder = ImageBitmapDecoder;
        let scaled = decoder.decode_downsampled(&jpeg, 2).expect("decode");
        assert_eq!((scaled.width(), scaled.height()), (160, 100));
    }

    #[test]
    fn test_decode_garbage_returns_none() {
        let decoder = ImageBitmapDecoder;
        assert!(decoder.probe_dimensions(b"not an image").is_none());
        assert!(decoder.decode_downsampled(b"not an image", 1).is_none());
    }
}
