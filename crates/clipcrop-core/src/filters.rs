//! CSS-filter-equivalent color adjustments.
//!
//! Implements the filter list the full compositor accepts: brightness,
//! contrast, saturate, grayscale, sepia (percentages) and gaussian blur
//! (pixels), applied in that order, matching the CSS `filter` shorthand
//! the options were authored against.
//!
//! Color math operates on normalized 0.0-1.0 channels; alpha passes
//! through untouched (blur is the exception, it spreads alpha too).

use crate::decode::SourceImage;
use crate::options::ColorFilters;

/// ITU-R BT.709 luminance coefficients, as used by the CSS filter
/// grayscale/saturate matrices.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Apply the full filter chain, producing a new buffer.
///
/// Identity filter sets return a plain clone.
pub fn apply_color_filters(image: &SourceImage, filters: &ColorFilters) -> SourceImage {
    if filters.is_identity() {
        return image.clone();
    }

    let mut pixels = image.pixels.clone();

    for chunk in pixels.chunks_exact_mut(4) {
        let mut r = chunk[0] as f32 / 255.0;
        let mut g = chunk[1] as f32 / 255.0;
        let mut b = chunk[2] as f32 / 255.0;

        (r, g, b) = apply_brightness(r, g, b, filters.brightness);
        (r, g, b) = apply_contrast(r, g, b, filters.contrast);
        (r, g, b) = apply_saturate(r, g, b, filters.saturation);
        (r, g, b) = apply_grayscale(r, g, b, filters.grayscale);
        (r, g, b) = apply_sepia(r, g, b, filters.sepia);

        chunk[0] = (r.clamp(0.0, 1.0) * 255.0).round() as u8;
        chunk[1] = (g.clamp(0.0, 1.0) * 255.0).round() as u8;
        chunk[2] = (b.clamp(0.0, 1.0) * 255.0).round() as u8;
    }

    let filtered = SourceImage::new(image.width, image.height, pixels);
    if filters.blur > 0.0 {
        gaussian_blur(&filtered, filters.blur)
    } else {
        filtered
    }
}

/// Gaussian blur over all four channels.
///
/// The CSS blur length is the gaussian standard deviation, which is also
/// what `imageops::blur` takes.
pub fn gaussian_blur(image: &SourceImage, sigma: f32) -> SourceImage {
    if sigma <= 0.0 || image.is_empty() {
        return image.clone();
    }
    let rgba = image
        .to_rgba_image()
        .expect("pixel buffer length matches dimensions");
    SourceImage::from_rgba_image(image::imageops::blur(&rgba, sigma))
}

/// brightness(p%): scales all channels. 100 is identity, 0 is black.
#[inline]
fn apply_brightness(r: f32, g: f32, b: f32, percent: f32) -> (f32, f32, f32) {
    if percent == 100.0 {
        return (r, g, b);
    }
    let f = (percent / 100.0).max(0.0);
    (r * f, g * f, b * f)
}

/// contrast(p%): scales distance from mid-gray. 100 is identity.
#[inline]
fn apply_contrast(r: f32, g: f32, b: f32, percent: f32) -> (f32, f32, f32) {
    if percent == 100.0 {
        return (r, g, b);
    }
    let f = (percent / 100.0).max(0.0);
    (
        (r - 0.5) * f + 0.5,
        (g - 0.5) * f + 0.5,
        (b - 0.5) * f + 0.5,
    )
}

/// saturate(p%): interpolates between luminance (0) and an oversaturated
/// extrapolation (>100). 100 is identity.
#[inline]
fn apply_saturate(r: f32, g: f32, b: f32, percent: f32) -> (f32, f32, f32) {
    if percent == 100.0 {
        return (r, g, b);
    }
    let s = (percent / 100.0).max(0.0);
    let lum = LUMA_R * r + LUMA_G * g + LUMA_B * b;
    (
        lum + (r - lum) * s,
        lum + (g - lum) * s,
        lum + (b - lum) * s,
    )
}

/// grayscale(p%): interpolates toward luminance. 0 is identity.
#[inline]
fn apply_grayscale(r: f32, g: f32, b: f32, percent: f32) -> (f32, f32, f32) {
    if percent == 0.0 {
        return (r, g, b);
    }
    let t = (percent / 100.0).clamp(0.0, 1.0);
    let lum = LUMA_R * r + LUMA_G * g + LUMA_B * b;
    (
        r + (lum - r) * t,
        g + (lum - g) * t,
        b + (lum - b) * t,
    )
}

/// sepia(p%): interpolates toward the sepia matrix output. 0 is identity.
#[inline]
fn apply_sepia(r: f32, g: f32, b: f32, percent: f32) -> (f32, f32, f32) {
    if percent == 0.0 {
        return (r, g, b);
    }
    let t = (percent / 100.0).clamp(0.0, 1.0);
    let sr = 0.393 * r + 0.769 * g + 0.189 * b;
    let sg = 0.349 * r + 0.686 * g + 0.168 * b;
    let sb = 0.272 * r + 0.534 * g + 0.131 * b;
    (
        r + (sr - r) * t,
        g + (sg - g) * t,
        b + (sb - b) * t,
    )
}
