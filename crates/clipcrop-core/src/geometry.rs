//! Coordinate-space transforms: stage rotation, crop extraction, resize.
//!
//! The pipeline never rotates the crop rectangle itself. Instead the full
//! source is drawn onto an oversized square "stage" and rotated there, so
//! rotation can never clip source content; the crop rectangle is then
//! sampled out of the rotated stage in source-pixel coordinates.
//!
//! # Coordinate System
//!
//! - Crop coordinates are source pixels, origin top-left, axis-aligned
//! - Rotation angles are in degrees, positive = clockwise
//! - Fractional crop origins are rounded at use

use crate::decode::SourceImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage oversize factor: `max(w, h) * 1.5` per axis keeps the whole
/// source inside the stage for any rotation angle.
const STAGE_FACTOR: f64 = 1.5;

/// Error raised for geometric precondition violations.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// Crop width or height is zero, negative, or not finite.
    #[error("Crop rectangle must have positive dimensions, got {width}x{height}")]
    EmptyCrop { width: f64, height: f64 },
}

/// A crop region in source-pixel coordinates, origin top-left.
///
/// `x`/`y` may be fractional; they are rounded when pixels are sampled.
/// Width and height must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Validate the precondition that the region is non-empty.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let finite = self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite();
        if !finite || self.width <= 0.0 || self.height <= 0.0 {
            return Err(GeometryError::EmptyCrop {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Compute the stage side length for a source image.
pub fn stage_side(width: u32, height: u32) -> u32 {
    (width.max(height) as f64 * STAGE_FACTOR).ceil() as u32
}

/// Draw the source centered on an oversized square stage, rotated
/// clockwise by `rotation_degrees` about the stage center.
///
/// Pixels outside the rotated source are transparent. A rotation that is
/// an exact multiple of 360 degrees takes a fast blit path with no
/// resampling.
pub fn rotate_onto_stage(image: &SourceImage, rotation_degrees: f64) -> SourceImage {
    let side = stage_side(image.width, image.height);
    let offset_x = (side - image.width) as f64 / 2.0;
    let offset_y = (side - image.height) as f64 / 2.0;

    let normalized = rotation_degrees.rem_euclid(360.0);
    if normalized.abs() < 0.001 || (360.0 - normalized) < 0.001 {
        return blit_centered(image, side);
    }

    let angle = rotation_degrees.to_radians();
    let (sin, cos) = angle.sin_cos();
    let center = side as f64 / 2.0;

    let mut pixels = vec![0u8; (side as usize) * (side as usize) * 4];

    for dst_y in 0..side {
        for dst_x in 0..side {
            // Inverse-rotate the destination point about the stage center,
            // then undo the centering translation to land in source space.
            let dx = dst_x as f64 + 0.5 - center;
            let dy = dst_y as f64 + 0.5 - center;
            let src_x = dx * cos + dy * sin + center - offset_x - 0.5;
            let src_y = -dx * sin + dy * cos + center - offset_y - 0.5;

            let pixel = sample_bilinear(image, src_x, src_y);
            let idx = ((dst_y as usize * side as usize) + dst_x as usize) * 4;
            pixels[idx..idx + 4].copy_from_slice(&pixel);
        }
    }

    SourceImage::new(side, side, pixels)
}

/// Copy the source unrotated onto the center of a transparent stage.
fn blit_centered(image: &SourceImage, side: u32) -> SourceImage {
    let off_x = (side - image.width) / 2;
    let off_y = (side - image.height) / 2;

    let mut pixels = vec![0u8; (side as usize) * (side as usize) * 4];
    for y in 0..image.height {
        let src_start = (y as usize * image.width as usize) * 4;
        let src_end = src_start + image.width as usize * 4;
        let dst_start = (((y + off_y) as usize * side as usize) + off_x as usize) * 4;
        pixels[dst_start..dst_start + image.width as usize * 4]
            .copy_from_slice(&image.pixels[src_start..src_end]);
    }
    SourceImage::new(side, side, pixels)
}

/// Sample an RGBA pixel with bilinear interpolation.
///
/// Out-of-bounds taps are transparent, so rotated content fades cleanly
/// into the empty stage instead of smearing edge pixels.
fn sample_bilinear(image: &SourceImage, x: f64, y: f64) -> [u8; 4] {
    let (w, h) = (image.width as i64, image.height as i64);

    if x < -1.0 || x >= w as f64 || y < -1.0 || y >= h as f64 {
        return [0, 0, 0, 0];
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let tap = |px: i64, py: i64| -> [f64; 4] {
        if px < 0 || px >= w || py < 0 || py >= h {
            return [0.0; 4];
        }
        let idx = ((py as usize * image.width as usize) + px as usize) * 4;
        [
            image.pixels[idx] as f64,
            image.pixels[idx + 1] as f64,
            image.pixels[idx + 2] as f64,
            image.pixels[idx + 3] as f64,
        ]
    };

    let p00 = tap(x0, y0);
    let p10 = tap(x0 + 1, y0);
    let p01 = tap(x0, y0 + 1);
    let p11 = tap(x0 + 1, y0 + 1);

    let mut result = [0u8; 4];
    for i in 0..4 {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        result[i] = v.clamp(0.0, 255.0).round() as u8;
    }
    result
}

/// Round half-up, matching the rounding the original coordinates were
/// authored against (`-2.5` rounds to `-2`, not `-3`).
fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Compute the padded crop buffer dimensions.
pub fn padded_crop_dims(crop: &CropRect, padding: f64) -> (u32, u32) {
    let cw = (crop.width + padding * 2.0).round().max(1.0) as u32;
    let ch = (crop.height + padding * 2.0).round().max(1.0) as u32;
    (cw, ch)
}

/// Copy the crop region (expanded by `padding` on all sides) out of the
/// rotated stage into a new buffer.
///
/// The stage region that falls outside the crop buffer is discarded;
/// crop-buffer pixels with no stage coverage stay transparent. Background
/// fill happens later, at composite time, so the caller sees one
/// consistent behavior for padding, rotation gaps, and mask cutouts.
pub fn extract_padded_crop(
    stage: &SourceImage,
    source_width: u32,
    source_height: u32,
    crop: &CropRect,
    padding: f64,
) -> SourceImage {
    let (cw, ch) = padded_crop_dims(crop, padding);

    // The source sits at the centering offset on the stage; the padded
    // crop origin (rounded here, per the fractional-coordinate contract)
    // selects where sampling starts.
    let blit_x = ((stage.width - source_width) / 2) as i64;
    let blit_y = ((stage.height - source_height) / 2) as i64;
    let start_x = blit_x + round_half_up(crop.x - padding);
    let start_y = blit_y + round_half_up(crop.y - padding);

    let mut pixels = vec![0u8; (cw as usize) * (ch as usize) * 4];

    for dy in 0..ch as i64 {
        let sy = start_y + dy;
        if sy < 0 || sy >= stage.height as i64 {
            continue;
        }
        for dx in 0..cw as i64 {
            let sx = start_x + dx;
            if sx < 0 || sx >= stage.width as i64 {
                continue;
            }
            let src_idx = ((sy as usize * stage.width as usize) + sx as usize) * 4;
            let dst_idx = ((dy as usize * cw as usize) + dx as usize) * 4;
            pixels[dst_idx..dst_idx + 4].copy_from_slice(&stage.pixels[src_idx..src_idx + 4]);
        }
    }

    SourceImage::new(cw, ch, pixels)
}

/// Output canvas dimensions for a mask shape.
///
/// A circle is inscribed in the smaller padded-crop dimension, producing
/// a square canvas; any excess on the longer axis is simply outside the
/// circle. Rect and round-rect keep the padded crop dimensions.
pub fn output_dims(cw: u32, ch: u32, circle: bool) -> (u32, u32) {
    if circle {
        let side = cw.min(ch);
        (side, side)
    } else {
        (cw, ch)
    }
}

/// Resize policy for `out_size` (fast path, and full-path parity for the
/// batch fallback).
///
/// Rect-like masks: width becomes `out_size`, height scales with the
/// pre-resize aspect ratio. Circle output is already square, so both
/// dimensions become `out_size`.
pub fn out_size_dims(width: u32, height: u32, out_size: u32, circle: bool) -> (u32, u32) {
    if circle {
        (out_size, out_size)
    } else {
        let th = (out_size as f64 * height as f64 / width as f64)
            .round()
            .max(1.0) as u32;
        (out_size, th)
    }
}

/// Resize with high-quality Lanczos3 interpolation.
pub fn resize(image: &SourceImage, width: u32, height: u32) -> SourceImage {
    if image.width == width && image.height == height {
        return image.clone();
    }
    let rgba = image
        .to_rgba_image()
        .expect("pixel buffer length matches dimensions");
    let resized =
        image::imageops::resize(&rgba, width, height, image::imageops::FilterType::Lanczos3);
    SourceImage::from_rgba_image(resized)
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (4u32..=48, 4u32..=48)
    }

    proptest! {
        /// Property: the stage always fully contains the source diagonal.
        #[test]
        fn prop_stage_contains_rotated_source(
            (width, height) in dimensions_strategy(),
        ) {
            let side = stage_side(width, height) as f64;
            let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
            prop_assert!(side + 1.0 >= diagonal);
        }

        /// Property: padded crop dimensions are positive and grow with
        /// padding.
        #[test]
        fn prop_padded_dims_positive(
            w in 1.0f64..200.0,
            h in 1.0f64..200.0,
            padding in 0.0f64..50.0,
        ) {
            let crop = CropRect::new(0.0, 0.0, w, h);
            let (cw, ch) = padded_crop_dims(&crop, padding);
            prop_assert!(cw >= 1 && ch >= 1);
            let (cw0, ch0) = padded_crop_dims(&crop, 0.0);
            prop_assert!(cw >= cw0 && ch >= ch0);
        }

        /// Property: circle output is always square with the smaller side.
        #[test]
        fn prop_circle_output_square(
            cw in 1u32..500,
            ch in 1u32..500,
        ) {
            let (ow, oh) = output_dims(cw, ch, true);
            prop_assert_eq!(ow, oh);
            prop_assert_eq!(ow, cw.min(ch));
        }

        /// Property: rect resize preserves aspect ratio within rounding.
        #[test]
        fn prop_out_size_aspect(
            w in 10u32..400,
            h in 10u32..400,
            out in 10u32..600,
        ) {
            let (tw, th) = out_size_dims(w, h, out, false);
            prop_assert_eq!(tw, out);
            let expected = out as f64 * h as f64 / w as f64;
            prop_assert!((th as f64 - expected).abs() <= 1.0);
        }
    }
}
