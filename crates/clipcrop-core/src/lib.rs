//! Clipcrop Core - Crop-and-compose image pipeline
//!
//! This crate provides the image processing functionality for Clipcrop:
//! source decoding, stage rotation, padded crop extraction, mask clipping
//! with feathering, color filters, borders, shadows, watermarks, and
//! output encoding.
//!
//! The two entry points are [`compose::compose`] (full fidelity) and
//! [`compose::compose_fast`] (the reduced batch pipeline).

pub mod color;
pub mod compose;
pub mod decode;
pub mod encode;
pub mod filters;
pub mod geometry;
pub mod mask;
pub mod options;
pub mod saliency;
pub mod watermark;

pub use color::{Color, ParseColorError};
pub use compose::{compose, compose_fast, compose_ref, ComposeError, ComposedImage};
pub use decode::{decode_image, load_image, probe_image, DecodeError, ImageInfo, SourceImage};
pub use geometry::{CropRect, GeometryError};
pub use options::{
    fast_path_dropped_effects, ColorFilters, ExportOptions, MaskShape, OptionsError, OutputFormat,
    Shadow, WatermarkImage, WatermarkText, FAST_PATH_OMITS,
};
