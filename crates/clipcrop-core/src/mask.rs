//! Mask clipping, feathered edges, border strokes, and drop shadows.
//!
//! Shapes are evaluated analytically per pixel from a signed distance to
//! the mask boundary, which gives a one-pixel antialiased edge without a
//! supersampled mask buffer. Clipping multiplies the existing alpha
//! channel (a destination-in composite), so already-transparent regions
//! stay transparent.

use crate::color::Color;
use crate::decode::SourceImage;
use crate::filters::gaussian_blur;
use crate::geometry::output_dims;
use crate::options::{MaskShape, Shadow};

/// Signed distance from a pixel-center point to the mask boundary.
///
/// Negative inside, positive outside. The round-rect corner radius is
/// capped at half the smaller dimension, after which the shape degrades
/// gracefully into a capsule.
fn shape_sdf(x: f64, y: f64, width: f64, height: f64, shape: MaskShape, radius: f64) -> f64 {
    let cx = width / 2.0;
    let cy = height / 2.0;
    let px = x - cx;
    let py = y - cy;

    match shape {
        MaskShape::Circle => {
            let r = width.min(height) / 2.0;
            (px * px + py * py).sqrt() - r
        }
        MaskShape::RoundRect | MaskShape::Rect => {
            let rr = match shape {
                MaskShape::RoundRect => radius.clamp(0.0, width.min(height) / 2.0),
                _ => 0.0,
            };
            // Rounded-box SDF: distance to the box shrunk by rr, minus rr
            let qx = px.abs() - (cx - rr);
            let qy = py.abs() - (cy - rr);
            let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
            outside + qx.max(qy).min(0.0) - rr
        }
    }
}

/// Per-pixel shape coverage (0.0 outside, 1.0 inside, antialiased edge).
///
/// `inset` shrinks the shape uniformly; insetting the SDF level set keeps
/// round-rect corners concentric the way a canvas path inset would.
pub fn shape_coverage(
    width: u32,
    height: u32,
    shape: MaskShape,
    radius: f64,
    inset: f64,
) -> Vec<f32> {
    let mut coverage = Vec::with_capacity((width as usize) * (height as usize));
    for y in 0..height {
        for x in 0..width {
            let sdf = shape_sdf(
                x as f64 + 0.5,
                y as f64 + 0.5,
                width as f64,
                height as f64,
                shape,
                radius,
            );
            coverage.push((0.5 - (sdf + inset)).clamp(0.0, 1.0) as f32);
        }
    }
    coverage
}

/// Clip an image to the hard mask silhouette.
///
/// A circle output is square, inscribed in the smaller input dimension and
/// centered; rect and round-rect keep the input dimensions. Rectangular
/// masks clip nothing and return a plain copy. Edge softening is a
/// separate pass, see [`apply_feather`].
pub fn apply_mask(image: &SourceImage, shape: MaskShape, radius: f64) -> SourceImage {
    if !shape.is_shaped() {
        return image.clone();
    }

    let circle = shape == MaskShape::Circle;
    let (ow, oh) = output_dims(image.width, image.height, circle);

    // Center the output window over the input (only the circle can shrink)
    let off_x = (image.width - ow) / 2;
    let off_y = (image.height - oh) / 2;

    let mut pixels = vec![0u8; (ow as usize) * (oh as usize) * 4];
    for y in 0..oh {
        let src_start = (((y + off_y) * image.width + off_x) * 4) as usize;
        let dst_start = (y * ow * 4) as usize;
        let row_len = (ow * 4) as usize;
        pixels[dst_start..dst_start + row_len]
            .copy_from_slice(&image.pixels[src_start..src_start + row_len]);
    }

    let coverage = shape_coverage(ow, oh, shape, radius, 0.0);
    for (chunk, cov) in pixels.chunks_exact_mut(4).zip(coverage.iter()) {
        chunk[3] = (chunk[3] as f32 * cov).round() as u8;
    }

    SourceImage::new(ow, oh, pixels)
}

/// Soften the mask edge with a destination-in composite of the feathered
/// shape coverage.
///
/// This multiplies the alpha of everything on the canvas, background fill
/// included, so a feathered export fades to transparency at the boundary
/// even when an opaque background was filled in first. No-op for
/// rectangular masks or a non-positive feather width.
pub fn apply_feather(
    image: &SourceImage,
    shape: MaskShape,
    radius: f64,
    feather: f64,
) -> SourceImage {
    if feather <= 0.0 || !shape.is_shaped() {
        return image.clone();
    }

    let coverage = feathered_coverage(image.width, image.height, shape, radius, feather);
    let mut out = image.clone();
    for (chunk, cov) in out.pixels.chunks_exact_mut(4).zip(coverage.iter()) {
        chunk[3] = (chunk[3] as f32 * cov).round() as u8;
    }
    out
}

/// Shape coverage inset by half the feather width and gaussian-blurred
/// by the full width, producing a soft edge centered near the nominal
/// boundary.
fn feathered_coverage(
    width: u32,
    height: u32,
    shape: MaskShape,
    radius: f64,
    feather: f64,
) -> Vec<f32> {
    let sharp = shape_coverage(width, height, shape, radius, feather / 2.0);

    // Route the single-channel mask through the RGBA blur by carrying the
    // coverage in the alpha channel
    let mut mask_pixels = vec![0u8; (width as usize) * (height as usize) * 4];
    for (chunk, cov) in mask_pixels.chunks_exact_mut(4).zip(sharp.iter()) {
        chunk[3] = (cov * 255.0).round() as u8;
    }
    let mask = SourceImage::new(width, height, mask_pixels);
    let blurred = gaussian_blur(&mask, feather as f32);

    blurred
        .pixels
        .chunks_exact(4)
        .map(|chunk| chunk[3] as f32 / 255.0)
        .collect()
}

/// Stroke the mask boundary with a centered band of the given width.
///
/// The stroke straddles the boundary the way a canvas path stroke does.
/// Returns a copy with the stroke composited over the image.
pub fn draw_border(
    image: &SourceImage,
    shape: MaskShape,
    radius: f64,
    color: Color,
    width: f64,
) -> SourceImage {
    if width <= 0.0 || color.a == 0 {
        return image.clone();
    }

    let mut out = image.clone();
    let half = width / 2.0;
    let (w, h) = (image.width as f64, image.height as f64);

    for y in 0..image.height {
        for x in 0..image.width {
            let sdf = shape_sdf(x as f64 + 0.5, y as f64 + 0.5, w, h, shape, radius);
            let band = (half - sdf.abs() + 0.5).clamp(0.0, 1.0);
            if band <= 0.0 {
                continue;
            }
            let alpha = (color.a as f64 * band).round() as u8;
            let idx = ((y * image.width + x) * 4) as usize;
            blend_over(
                &mut out.pixels[idx..idx + 4],
                [color.r, color.g, color.b, alpha],
            );
        }
    }
    out
}

/// Render a drop shadow behind the image (a destination-over composite).
///
/// The shadow silhouette is the image's own alpha channel, offset and
/// blurred. Canvas semantics: the blur radius maps to a gaussian sigma of
/// half the radius, and the canvas does not grow to fit the shadow.
pub fn apply_shadow(image: &SourceImage, shadow: &Shadow) -> SourceImage {
    if shadow.color.a == 0 {
        return image.clone();
    }

    let (w, h) = (image.width, image.height);
    let ox = shadow.offset_x.round() as i64;
    let oy = shadow.offset_y.round() as i64;

    let mut layer_pixels = vec![0u8; (w as usize) * (h as usize) * 4];
    for y in 0..h as i64 {
        let sy = y - oy;
        if sy < 0 || sy >= h as i64 {
            continue;
        }
        for x in 0..w as i64 {
            let sx = x - ox;
            if sx < 0 || sx >= w as i64 {
                continue;
            }
            let src_idx = ((sy as u32 * w + sx as u32) * 4) as usize;
            let src_a = image.pixels[src_idx + 3] as u32;
            if src_a == 0 {
                continue;
            }
            let dst_idx = ((y as u32 * w + x as u32) * 4) as usize;
            layer_pixels[dst_idx] = shadow.color.r;
            layer_pixels[dst_idx + 1] = shadow.color.g;
            layer_pixels[dst_idx + 2] = shadow.color.b;
            layer_pixels[dst_idx + 3] = ((src_a * shadow.color.a as u32) / 255) as u8;
        }
    }

    let mut layer = SourceImage::new(w, h, layer_pixels);
    if shadow.blur > 0.0 {
        layer = gaussian_blur(&layer, (shadow.blur / 2.0) as f32);
    }

    // Image over shadow layer
    for (dst, src) in layer.pixels.chunks_exact_mut(4).zip(image.pixels.chunks_exact(4)) {
        blend_over(dst, [src[0], src[1], src[2], src[3]]);
    }
    layer
}

/// Source-over blend of a non-premultiplied RGBA pixel onto `dst`.
pub(crate) fn blend_over(dst: &mut [u8], src: [u8; 4]) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        dst[..4].copy_from_slice(&src);
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        dst[..4].fill(0);
        return;
    }
    for i in 0..3 {
        let sc = src[i] as f32;
        let dc = dst[i] as f32;
        dst[i] = ((sc * sa + dc * da * (1.0 - sa)) / out_a).round() as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red(width: u32, height: u32) -> SourceImage {
        SourceImage::solid(width, height, [255, 0, 0, 255])
    }

    fn alpha_at(img: &SourceImage, x: u32, y: u32) -> u8 {
        img.pixels[((y * img.width + x) * 4 + 3) as usize]
    }

    #[test]
    fn test_rect_mask_is_noop() {
        let img = red(10, 8);
        let out = apply_mask(&img, MaskShape::Rect, 0.0);
        assert_eq!(out.pixels, img.pixels);
        assert_eq!((out.width, out.height), (10, 8));
    }

    #[test]
    fn test_circle_clips_corners() {
        let img = red(20, 20);
        let out = apply_mask(&img, MaskShape::Circle, 0.0);

        assert_eq!((out.width, out.height), (20, 20));
        assert_eq!(alpha_at(&out, 0, 0), 0);
        assert_eq!(alpha_at(&out, 19, 19), 0);
        assert_eq!(alpha_at(&out, 10, 10), 255);
    }

    #[test]
    fn test_circle_inscribes_smaller_dimension() {
        let img = red(20, 12);
        let out = apply_mask(&img, MaskShape::Circle, 0.0);

        // Square output sized to the smaller input dimension
        assert_eq!((out.width, out.height), (12, 12));
        assert_eq!(alpha_at(&out, 6, 6), 255);
        assert_eq!(alpha_at(&out, 0, 0), 0);
    }

    #[test]
    fn test_circle_edge_is_antialiased() {
        let img = red(21, 21);
        let out = apply_mask(&img, MaskShape::Circle, 0.0);

        let partial = out
            .pixels
            .chunks_exact(4)
            .filter(|p| p[3] > 0 && p[3] < 255)
            .count();
        assert!(partial > 0, "expected antialiased boundary pixels");
    }

    #[test]
    fn test_round_rect_clips_corners_keeps_edges() {
        let img = red(40, 30);
        let out = apply_mask(&img, MaskShape::RoundRect, 8.0);

        assert_eq!((out.width, out.height), (40, 30));
        assert_eq!(alpha_at(&out, 0, 0), 0);
        // Edge midpoints are outside the corner arcs
        assert_eq!(alpha_at(&out, 20, 0), 255);
        assert_eq!(alpha_at(&out, 0, 15), 255);
        assert_eq!(alpha_at(&out, 20, 15), 255);
    }

    #[test]
    fn test_round_rect_radius_capped() {
        // Radius far beyond half the smaller dimension must not invert
        let img = red(30, 10);
        let out = apply_mask(&img, MaskShape::RoundRect, 500.0);
        assert_eq!(alpha_at(&out, 15, 5), 255);
    }

    #[test]
    fn test_zero_radius_round_rect_is_full_rect() {
        let img = red(16, 16);
        let out = apply_mask(&img, MaskShape::RoundRect, 0.0);
        assert_eq!(alpha_at(&out, 0, 0), 255);
        assert_eq!(alpha_at(&out, 15, 15), 255);
    }

    #[test]
    fn test_mask_preserves_existing_transparency() {
        let mut img = red(20, 20);
        // Punch a transparent pixel in the middle
        let idx = ((10 * 20 + 10) * 4 + 3) as usize;
        img.pixels[idx] = 0;

        let out = apply_mask(&img, MaskShape::Circle, 0.0);
        assert_eq!(alpha_at(&out, 10, 10), 0);
    }

    #[test]
    fn test_feather_softens_interior_edge() {
        let img = red(40, 40);
        let sharp = apply_mask(&img, MaskShape::Circle, 0.0);
        let soft = apply_feather(&sharp, MaskShape::Circle, 0.0, 6.0);

        // Just inside the boundary the feathered mask is dimmer
        assert!(alpha_at(&soft, 20, 2) < alpha_at(&sharp, 20, 2));
        // The center stays effectively opaque
        assert!(alpha_at(&soft, 20, 20) > 240);
    }

    #[test]
    fn test_feather_fades_opaque_background() {
        // Destination-in must cut through an opaque fill, not just the
        // shape's own pixels
        let img = SourceImage::solid(40, 40, [255, 255, 255, 255]);
        let out = apply_feather(&img, MaskShape::Circle, 0.0, 6.0);

        // The gaussian tail leaves a faint fringe at most
        assert!(alpha_at(&out, 0, 0) < 32);
        assert!(alpha_at(&out, 20, 20) > 240);
    }

    #[test]
    fn test_feather_noop_for_rect_or_zero() {
        let img = red(10, 10);
        let out = apply_feather(&img, MaskShape::Rect, 0.0, 6.0);
        assert_eq!(out.pixels, img.pixels);
        let out = apply_feather(&img, MaskShape::Circle, 0.0, 0.0);
        assert_eq!(out.pixels, img.pixels);
    }

    #[test]
    fn test_border_strokes_boundary() {
        let img = red(30, 30);
        let masked = apply_mask(&img, MaskShape::Circle, 0.0);
        let out = draw_border(&masked, MaskShape::Circle, 0.0, Color::BLACK, 4.0);

        // Top edge midpoint sits on the boundary: stroked dark
        let idx = ((30 + 15) * 4) as usize;
        assert!(out.pixels[idx] < 64, "stroke should darken the boundary");
        // Center keeps the fill color
        let center = ((15 * 30 + 15) * 4) as usize;
        assert_eq!(out.pixels[center], 255);
    }

    #[test]
    fn test_zero_width_border_is_noop() {
        let img = red(10, 10);
        let out = draw_border(&img, MaskShape::Circle, 0.0, Color::BLACK, 0.0);
        assert_eq!(out.pixels, img.pixels);
    }

    #[test]
    fn test_shadow_fills_behind_offset() {
        // Small opaque square in the middle of a transparent canvas
        let mut img = SourceImage::solid(30, 30, [0, 0, 0, 0]);
        for y in 10..20u32 {
            for x in 10..20u32 {
                let idx = ((y * 30 + x) * 4) as usize;
                img.pixels[idx..idx + 4].copy_from_slice(&[0, 200, 0, 255]);
            }
        }

        let shadow = Shadow {
            color: Color::BLACK,
            blur: 0.0,
            offset_x: 5.0,
            offset_y: 5.0,
        };
        let out = apply_shadow(&img, &shadow);

        // Offset region outside the square silhouette gains shadow alpha
        assert!(alpha_at(&out, 22, 22) > 0);
        // The square itself still shows its own content
        let idx = ((15 * 30 + 15) * 4) as usize;
        assert_eq!(out.pixels[idx + 1], 200);
        // Far corner stays empty
        assert_eq!(alpha_at(&out, 0, 0), 0);
    }

    #[test]
    fn test_shadow_blur_spreads() {
        let mut img = SourceImage::solid(40, 40, [0, 0, 0, 0]);
        for y in 15..25u32 {
            for x in 15..25u32 {
                let idx = ((y * 40 + x) * 4) as usize;
                img.pixels[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }

        let shadow = Shadow {
            color: Color::BLACK,
            blur: 8.0,
            offset_x: 0.0,
            offset_y: 0.0,
        };
        let out = apply_shadow(&img, &shadow);

        // Blur pushes shadow alpha outside the hard silhouette
        assert!(alpha_at(&out, 13, 20) > 0);
    }

    #[test]
    fn test_transparent_shadow_is_noop() {
        let img = red(10, 10);
        let shadow = Shadow {
            color: Color::TRANSPARENT,
            blur: 4.0,
            offset_x: 2.0,
            offset_y: 2.0,
        };
        let out = apply_shadow(&img, &shadow);
        assert_eq!(out.pixels, img.pixels);
    }

    #[test]
    fn test_blend_over_opaque_src_replaces() {
        let mut dst = [10, 20, 30, 255];
        blend_over(&mut dst, [200, 100, 50, 255]);
        assert_eq!(dst, [200, 100, 50, 255]);
    }

    #[test]
    fn test_blend_over_transparent_src_is_noop() {
        let mut dst = [10, 20, 30, 128];
        blend_over(&mut dst, [200, 100, 50, 0]);
        assert_eq!(dst, [10, 20, 30, 128]);
    }

    #[test]
    fn test_blend_over_half_alpha_mixes() {
        let mut dst = [0, 0, 0, 255];
        blend_over(&mut dst, [255, 255, 255, 128]);
        assert_eq!(dst[3], 255);
        assert!(dst[0] > 100 && dst[0] < 150);
    }
}
