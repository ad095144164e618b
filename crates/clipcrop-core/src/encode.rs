//! Output encoding for export.
//!
//! This module encodes composed RGBA buffers to their final container
//! format using the `image` crate's encoders. PNG and WebP keep the alpha
//! channel; JPEG cannot, so it is flattened over the export background
//! (black when none is set) before encoding.
//!
//! WebP output is lossless: the pure-Rust WebP encoder only implements
//! the lossless bitstream, so the quality hint applies to JPEG alone.

use crate::color::Color;
use crate::decode::SourceImage;
use crate::options::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;
use thiserror::Error;

/// Errors that can occur during output encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The underlying encoder failed
    #[error("{format:?} encoding failed: {message}")]
    EncodingFailed {
        format: OutputFormat,
        message: String,
    },
}

/// Encode a composed RGBA buffer to the requested format.
///
/// # Arguments
///
/// * `image` - Composed RGBA pixels
/// * `format` - Target container format
/// * `quality` - Encoder quality in 0.0..=1.0, used by JPEG only
/// * `background` - Flatten color for alpha-less formats; black when `None`
///
/// # Returns
///
/// Encoded bytes on success, or an error if the dimensions are empty or
/// the encoder fails.
pub fn encode(
    image: &SourceImage,
    format: OutputFormat,
    quality: f32,
    background: Option<Color>,
) -> Result<Vec<u8>, EncodeError> {
    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    let failed = |e: image::ImageError| EncodeError::EncodingFailed {
        format,
        message: e.to_string(),
    };

    match format {
        OutputFormat::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(
                    &image.pixels,
                    image.width,
                    image.height,
                    ExtendedColorType::Rgba8,
                )
                .map_err(failed)?;
        }
        OutputFormat::Jpeg => {
            let rgb = flatten_to_rgb(image, background.unwrap_or(Color::BLACK));
            let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
            JpegEncoder::new_with_quality(&mut buffer, q)
                .write_image(&rgb, image.width, image.height, ExtendedColorType::Rgb8)
                .map_err(failed)?;
        }
        OutputFormat::WebP => {
            WebPEncoder::new_lossless(&mut buffer)
                .write_image(
                    &image.pixels,
                    image.width,
                    image.height,
                    ExtendedColorType::Rgba8,
                )
                .map_err(failed)?;
        }
    }

    Ok(buffer.into_inner())
}

/// Composite RGBA pixels over an opaque background, dropping alpha.
fn flatten_to_rgb(image: &SourceImage, background: Color) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(image.pixel_count() as usize * 3);
    for chunk in image.pixels.chunks_exact(4) {
        let a = chunk[3] as u32;
        if a == 255 {
            rgb.extend_from_slice(&chunk[..3]);
            continue;
        }
        let inv = 255 - a;
        rgb.push(((chunk[0] as u32 * a + background.r as u32 * inv) / 255) as u8);
        rgb.push(((chunk[1] as u32 * a + background.g as u32 * inv) / 255) as u8);
        rgb.push(((chunk[2] as u32 * a + background.b as u32 * inv) / 255) as u8);
    }
    rgb
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=32, 1u32..=32)
    }

    fn format_strategy() -> impl Strategy<Value = OutputFormat> {
        prop_oneof![
            Just(OutputFormat::Png),
            Just(OutputFormat::Jpeg),
            Just(OutputFormat::WebP),
        ]
    }

    proptest! {
        /// Property: every format encodes any non-empty buffer.
        #[test]
        fn prop_valid_input_encodes(
            (width, height) in dimensions_strategy(),
            format in format_strategy(),
            quality in 0.0f32..=1.0,
        ) {
            let img = SourceImage::solid(width, height, [90, 120, 150, 255]);
            let result = encode(&img, format, quality, None);
            prop_assert!(result.is_ok());
            prop_assert!(!result.unwrap().is_empty());
        }

        /// Property: encoding is deterministic.
        #[test]
        fn prop_deterministic_output(
            (width, height) in dimensions_strategy(),
            format in format_strategy(),
        ) {
            let img = SourceImage::solid(width, height, [1, 2, 3, 200]);
            let a = encode(&img, format, 0.8, None).unwrap();
            let b = encode(&img, format, 0.8, None).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
