//! The compose pipeline: crop, transform, decorate, encode.
//!
//! Two compositors share the same geometry core:
//!
//! - [`compose`] runs the full pipeline: rotation, padded crop, color
//!   filters, mask clipping, background fill, feathering, border stroke,
//!   drop shadow, watermarks, resize, and encode.
//! - [`compose_fast`] runs the throughput-oriented subset used for batch
//!   export: rotation, padded crop, mask clipping, background fill,
//!   resize, and encode. The effects it skips are listed in
//!   [`crate::options::FAST_PATH_OMITS`].
//!
//! Every stage is a pure function from buffer to buffer; the pipeline
//! never mutates its inputs.

use crate::color::Color;
use crate::decode::{load_image, DecodeError, SourceImage};
use crate::encode::{encode, EncodeError};
use crate::filters::apply_color_filters;
use crate::geometry::{
    extract_padded_crop, out_size_dims, resize, rotate_onto_stage, CropRect, GeometryError,
};
use crate::mask::{apply_feather, apply_mask, apply_shadow, blend_over, draw_border};
use crate::options::{ExportOptions, MaskShape, OptionsError, OutputFormat};
use crate::watermark::{draw_watermark_image, draw_watermark_text, WatermarkError};
use thiserror::Error;

/// Errors that can occur while composing an export.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),
}

/// A finished export: encoded bytes plus the dimensions and the format
/// that was actually written (after alpha coercion).
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

/// Run the full compose pipeline on a decoded source image.
pub fn compose(
    image: &SourceImage,
    crop: &CropRect,
    options: &ExportOptions,
) -> Result<ComposedImage, ComposeError> {
    options.validate()?;
    crop.validate()?;

    let stage = rotate_onto_stage(image, options.rotation);
    let cropped = extract_padded_crop(&stage, image.width, image.height, crop, options.padding);

    let filtered = match &options.filters {
        Some(f) if !f.is_identity() => apply_color_filters(&cropped, f),
        _ => cropped,
    };

    let mut canvas = apply_mask(&filtered, options.mask, options.radius);

    // Background goes in before feathering so the soft edge fades the
    // fill along with the content, leaving the outside transparent.
    if let Some(bg) = options.background {
        canvas = fill_background(&canvas, bg);
    }

    if options.feather > 0.0 && options.mask.is_shaped() {
        canvas = apply_feather(&canvas, options.mask, options.radius, options.feather);
    }

    if let Some(color) = options.border_color {
        if options.border_width > 0.0 && options.mask.is_shaped() {
            canvas = draw_border(&canvas, options.mask, options.radius, color, options.border_width);
        }
    }

    if let Some(shadow) = &options.shadow {
        canvas = apply_shadow(&canvas, shadow);
    }

    if let Some(wm) = &options.watermark_text {
        canvas = draw_watermark_text(&canvas, wm)?;
    }
    if let Some(wm) = &options.watermark_image {
        canvas = draw_watermark_image(&canvas, wm);
    }

    finish(canvas, options)
}

/// Run the reduced batch pipeline: geometry, mask, background, resize,
/// encode. No filters, feathering, borders, shadows, or watermarks.
pub fn compose_fast(
    image: &SourceImage,
    crop: &CropRect,
    options: &ExportOptions,
) -> Result<ComposedImage, ComposeError> {
    options.validate()?;
    crop.validate()?;

    let stage = rotate_onto_stage(image, options.rotation);
    let cropped = extract_padded_crop(&stage, image.width, image.height, crop, options.padding);
    let mut canvas = apply_mask(&cropped, options.mask, options.radius);

    if let Some(bg) = options.background {
        canvas = fill_background(&canvas, bg);
    }

    finish(canvas, options)
}

/// Load an image reference (file path or base64 data URL) and run the
/// full pipeline on it.
pub fn compose_ref(
    reference: &str,
    crop: &CropRect,
    options: &ExportOptions,
) -> Result<ComposedImage, ComposeError> {
    let image = load_image(reference)?;
    compose(&image, crop, options)
}

/// Shared tail of both pipelines: resize to the requested output size and
/// encode with the resolved format.
fn finish(mut canvas: SourceImage, options: &ExportOptions) -> Result<ComposedImage, ComposeError> {
    let circle = options.mask == MaskShape::Circle;
    if let Some(out) = options.out_size {
        let (tw, th) = out_size_dims(canvas.width, canvas.height, out, circle);
        canvas = resize(&canvas, tw, th);
    }

    let format = options.resolved_format();
    let bytes = encode(&canvas, format, options.quality, options.background)?;
    Ok(ComposedImage {
        bytes,
        width: canvas.width,
        height: canvas.height,
        format,
    })
}

/// Composite the canvas over an opaque background color, filling mask
/// cutouts, rotation gaps, and padding alike.
fn fill_background(image: &SourceImage, color: Color) -> SourceImage {
    let mut out = SourceImage::solid(image.width, image.height, color.to_array());
    for (dst, src) in out.pixels.chunks_exact_mut(4).zip(image.pixels.chunks_exact(4)) {
        blend_over(dst, [src[0], src[1], src[2], src[3]]);
    }
    out
}
