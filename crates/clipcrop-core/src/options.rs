//! Export configuration for the compose pipeline.
//!
//! The options bag is an explicit, immutable configuration record with
//! defaulted fields, validated once at the pipeline entry point. An empty
//! bag (`ExportOptions::default()`) produces a valid rectangular,
//! unfiltered, unpadded crop at source resolution.
//!
//! # Format coercion
//!
//! Non-rectangular masks require an alpha channel, which JPEG cannot carry.
//! `resolved_format` therefore coerces `Jpeg` to `Png` whenever the mask is
//! not `Rect`.

use crate::color::Color;
use crate::decode::SourceImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when an options bag fails entry-point validation.
#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    /// A length field (padding, radius, feather, border width) is negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeLength { field: &'static str, value: f64 },

    /// Quality is outside the 0.0..=1.0 range.
    #[error("quality must be within 0.0..=1.0, got {0}")]
    QualityOutOfRange(f32),

    /// Requested output size is zero.
    #[error("outSize must be positive when set")]
    ZeroOutSize,
}

/// Output encoding format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
}

impl OutputFormat {
    /// File extension used for archive entry names (`jpeg` maps to `jpg`).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// Whether the format carries an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }
}

/// Output silhouette shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MaskShape {
    #[default]
    Rect,
    RoundRect,
    Circle,
}

impl MaskShape {
    /// Whether the shape clips anything (rect is a no-op mask).
    pub fn is_shaped(self) -> bool {
        !matches!(self, MaskShape::Rect)
    }
}

/// Drop shadow rendered behind the masked shape. Full pipeline only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    pub color: Color,
    /// Blur radius in pixels.
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// CSS-filter-equivalent color adjustments. Full pipeline only.
///
/// Percentages follow the CSS filter functions: 100 is the identity for
/// brightness/contrast/saturation, 0 is the identity for grayscale/sepia.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorFilters {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub grayscale: f32,
    pub sepia: f32,
    /// Gaussian blur in pixels.
    pub blur: f32,
}

impl Default for ColorFilters {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            grayscale: 0.0,
            sepia: 0.0,
            blur: 0.0,
        }
    }
}

impl ColorFilters {
    /// Check if every filter is at its identity value.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

/// Text watermark overlay. Full pipeline only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkText {
    pub text: String,
    /// Raw TTF/OTF font bytes supplied by the caller.
    pub font: Vec<u8>,
    /// Font size in pixels.
    pub size: f32,
    pub color: Color,
    /// Top-left anchor of the text run, in output pixels.
    pub x: f64,
    pub y: f64,
    /// Overlay opacity (0.0 to 1.0).
    pub alpha: f32,
}

/// Image watermark overlay. Full pipeline only.
#[derive(Debug, Clone)]
pub struct WatermarkImage {
    pub image: SourceImage,
    /// Top-left anchor in output pixels.
    pub x: f64,
    pub y: f64,
    /// Optional target size; when absent the image's own size is used.
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Overlay opacity (0.0 to 1.0).
    pub alpha: f32,
}

/// Transform options for one compose invocation.
///
/// Every field has a documented default; see the field docs. The bag is
/// immutable once validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Rotation in degrees, applied clockwise around the image center
    /// before cropping. Default 0.
    pub rotation: f64,
    /// Desired encoding. Default PNG. Subject to alpha coercion, see
    /// `resolved_format`.
    pub format: OutputFormat,
    /// Encoder quality hint (0.0 to 1.0), meaningful for lossy formats.
    /// Default 0.92.
    pub quality: f32,
    /// Output silhouette. Default rectangular (no clip).
    pub mask: MaskShape,
    /// Corner radius in pixels for `RoundRect`. Default 24.
    pub radius: f64,
    /// Target output dimension in pixels; width for rect-like masks
    /// (height scales proportionally), both sides for circle.
    pub out_size: Option<u32>,
    /// Stroke color along the mask boundary, non-rect masks only.
    pub border_color: Option<Color>,
    /// Stroke width in pixels. Default 0 (no border).
    pub border_width: f64,
    /// Uniform crop expansion in pixels on all sides. Default 0.
    pub padding: f64,
    /// Fill behind transparent regions; `None` preserves transparency.
    pub background: Option<Color>,
    /// Drop shadow behind the masked shape. Full pipeline only.
    pub shadow: Option<Shadow>,
    /// Color adjustments. Full pipeline only.
    pub filters: Option<ColorFilters>,
    /// Mask edge softening in pixels, non-rect masks only. Default 0.
    pub feather: f64,
    /// Text overlay. Full pipeline only.
    pub watermark_text: Option<WatermarkText>,
    /// Image overlay. Full pipeline only.
    #[serde(skip)]
    pub watermark_image: Option<WatermarkImage>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            format: OutputFormat::Png,
            quality: 0.92,
            mask: MaskShape::Rect,
            radius: 24.0,
            out_size: None,
            border_color: None,
            border_width: 0.0,
            padding: 0.0,
            background: None,
            shadow: None,
            filters: None,
            feather: 0.0,
            watermark_text: None,
            watermark_image: None,
        }
    }
}

impl ExportOptions {
    /// Validate the bag once at the pipeline entry point.
    pub fn validate(&self) -> Result<(), OptionsError> {
        for (field, value) in [
            ("padding", self.padding),
            ("radius", self.radius),
            ("feather", self.feather),
            ("borderWidth", self.border_width),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(OptionsError::NegativeLength { field, value });
            }
        }

        if !(0.0..=1.0).contains(&self.quality) {
            return Err(OptionsError::QualityOutOfRange(self.quality));
        }

        if self.out_size == Some(0) {
            return Err(OptionsError::ZeroOutSize);
        }

        Ok(())
    }

    /// Resolve the actual output format.
    ///
    /// JPEG cannot carry the alpha channel that non-rectangular masks
    /// require, so those combinations are forced to PNG.
    pub fn resolved_format(&self) -> OutputFormat {
        if self.mask.is_shaped() && self.format == OutputFormat::Jpeg {
            OutputFormat::Png
        } else {
            self.format
        }
    }

    /// The reduced-fidelity fallback bag used for automatic retry after a
    /// transient composition failure: no feather, no filters, no shadow.
    pub fn reduced(&self) -> Self {
        Self {
            feather: 0.0,
            filters: None,
            shadow: None,
            ..self.clone()
        }
    }
}

/// The effects the fast (batch/worker) compositor does not run.
///
/// The fast path trades fidelity for throughput at batch scale; the
/// omission is an explicit capability, not a silent drop. Callers that
/// need these effects in batch output must route through the full
/// compositor instead.
pub const FAST_PATH_OMITS: &[&str] = &["filters", "feather", "border", "shadow", "watermarks"];

/// List the effects that a given options bag requests but the fast
/// compositor will not apply.
pub fn fast_path_dropped_effects(options: &ExportOptions) -> Vec<&'static str> {
    let mut dropped = Vec::new();
    if options.filters.is_some_and(|f| !f.is_identity()) {
        dropped.push("filters");
    }
    if options.feather > 0.0 && options.mask.is_shaped() {
        dropped.push("feather");
    }
    if options.border_width > 0.0 && options.mask.is_shaped() {
        dropped.push("border");
    }
    if options.shadow.is_some() {
        dropped.push("shadow");
    }
    if options.watermark_text.is_some() || options.watermark_image.is_some() {
        dropped.push("watermarks");
    }
    dropped
}


// ============================================================================
// Property-Based Tests
// ============================================================================
