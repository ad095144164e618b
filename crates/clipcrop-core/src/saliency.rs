//! Detail-weighted crop suggestions.
//!
//! A cheap saliency estimate: the centroid of gradient magnitude over the
//! luminance channel. Flat regions (sky, backdrops) contribute nothing,
//! so the centroid settles on the detailed part of the picture. Good
//! enough to seed an initial crop; not a subject detector.

use crate::decode::SourceImage;
use crate::geometry::CropRect;

/// Sampling stride. Gradients are evaluated on every other pixel, which
/// quarters the work with no visible effect on the centroid.
const STRIDE: u32 = 2;

/// ITU-R BT.709 luminance of an RGBA pixel, ignoring alpha.
#[inline]
fn luminance(pixels: &[u8], idx: usize) -> f64 {
    0.2126 * pixels[idx] as f64 + 0.7152 * pixels[idx + 1] as f64 + 0.0722 * pixels[idx + 2] as f64
}

/// Suggest a crop center in source-pixel coordinates.
///
/// Returns the gradient-magnitude centroid, or the geometric center when
/// the image is too small or has no detail at all.
pub fn suggest_center(image: &SourceImage) -> (f64, f64) {
    let geometric = (image.width as f64 / 2.0, image.height as f64 / 2.0);
    if image.width < 3 || image.height < 3 {
        return geometric;
    }

    let w = image.width as usize;
    let mut total = 0.0f64;
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;

    let mut y = 1;
    while y < image.height - 1 {
        let mut x = 1;
        while x < image.width - 1 {
            let idx = (y as usize * w + x as usize) * 4;
            let gx = luminance(&image.pixels, idx + 4) - luminance(&image.pixels, idx - 4);
            let gy = luminance(&image.pixels, idx + w * 4) - luminance(&image.pixels, idx - w * 4);
            let magnitude = (gx * gx + gy * gy).sqrt();

            total += magnitude;
            sum_x += magnitude * x as f64;
            sum_y += magnitude * y as f64;
            x += STRIDE;
        }
        y += STRIDE;
    }

    if total <= f64::EPSILON {
        return geometric;
    }
    (sum_x / total, sum_y / total)
}

/// Suggest a crop rectangle of the given size, centered on the detail
/// centroid and clamped to the source bounds.
///
/// Requested dimensions larger than the source are clamped to the source.
pub fn suggest_crop(image: &SourceImage, width: f64, height: f64) -> CropRect {
    let cw = width.max(1.0).min(image.width as f64);
    let ch = height.max(1.0).min(image.height as f64);
    let (cx, cy) = suggest_center(image);

    let x = (cx - cw / 2.0).clamp(0.0, image.width as f64 - cw);
    let y = (cy - ch / 2.0).clamp(0.0, image.height as f64 - ch);
    CropRect::new(x, y, cw, ch)
}
