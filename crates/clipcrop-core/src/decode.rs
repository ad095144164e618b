//! Source image decoding.
//!
//! This module provides the `SourceImage` pixel buffer type and the decoding
//! entry points for the compose pipeline. A source image is decoded exactly
//! once from caller-supplied bytes or an image reference and is read-only
//! for the duration of a compositor invocation.
//!
//! # Supported references
//!
//! `load_image` resolves two kinds of references:
//! - `data:image/...;base64,` data URLs
//! - filesystem paths
//!
//! Acquisition concerns beyond this input contract (file picking, paste,
//! EXIF correction) are out of scope and handled by the caller.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::ImageReader;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not a recognized or supported image format.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// A data URL reference could not be parsed.
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    /// I/O error while reading an image reference.
    #[error("I/O error: {0}")]
    IoError(String),
}

/// A decoded image with RGBA pixel data.
///
/// Pixels are stored non-premultiplied, row-major, 4 bytes per pixel.
/// The buffer is never mutated in place; every pipeline step produces
/// a new buffer.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGBA pixel data in row-major order (4 bytes per pixel).
    /// Length should be width * height * 4.
    pub pixels: Vec<u8>,
}

impl SourceImage {
    /// Create a new SourceImage with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width as usize) * (height as usize) * 4,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a SourceImage from an image::RgbaImage.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img.into_raw();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Convert to an image::RgbaImage for further processing.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Create an opaque single-color image. Handy for tests and fixtures.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}

/// Dimensions probed from an image reference without a full pipeline run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Probe the dimensions of encoded bytes without decoding the pixels.
///
/// Useful for sizing crop UI and validating uploads before committing to
/// a full decode.
pub fn probe_image(bytes: &[u8]) -> Result<ImageInfo, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::IoError(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    Ok(ImageInfo { width, height })
}

/// Decode an image from raw encoded bytes (PNG, JPEG, or WebP).
///
/// The container format is sniffed from the bytes, so callers do not need
/// to know the format up front.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` for unrecognized bytes and
/// `DecodeError::CorruptedFile` when the container is recognized but
/// cannot be decoded.
pub fn decode_image(bytes: &[u8]) -> Result<SourceImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::IoError(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    Ok(SourceImage::from_rgba_image(img.into_rgba8()))
}

/// Load and decode an image from a resolvable reference.
///
/// The reference is either a `data:` URL with base64 payload or a
/// filesystem path.
pub fn load_image(image_ref: &str) -> Result<SourceImage, DecodeError> {
    if image_ref.starts_with("data:") {
        let bytes = decode_data_url(image_ref)?;
        return decode_image(&bytes);
    }

    let bytes =
        std::fs::read(Path::new(image_ref)).map_err(|e| DecodeError::IoError(e.to_string()))?;
    decode_image(&bytes)
}

/// Extract the binary payload from a `data:<mime>;base64,<payload>` URL.
fn decode_data_url(url: &str) -> Result<Vec<u8>, DecodeError> {
    let payload = url
        .split_once(";base64,")
        .map(|(_, p)| p)
        .ok_or_else(|| DecodeError::MalformedDataUrl("missing ;base64, marker".to_string()))?;

    BASE64
        .decode(payload.trim())
        .map_err(|e| DecodeError::MalformedDataUrl(e.to_string()))
}
