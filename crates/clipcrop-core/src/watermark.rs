//! Watermark overlays: text runs and image stamps.
//!
//! Both overlays are composited source-over at a caller-supplied anchor,
//! clipped to the canvas. Text is rasterized from caller-supplied font
//! bytes; there is no bundled font.

use crate::decode::SourceImage;
use crate::geometry::resize;
use crate::mask::blend_over;
use crate::options::{WatermarkImage, WatermarkText};
use ab_glyph::{Font, FontRef, Glyph, PxScale, ScaleFont};
use thiserror::Error;

/// Error raised while rasterizing a text watermark.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// The supplied font bytes are not a parseable TTF/OTF face.
    #[error("Invalid font data")]
    InvalidFont,
}

/// Draw a text run onto a copy of the image.
///
/// The anchor is the top-left corner of the run; the baseline is placed
/// one ascent below it. Glyph coverage is modulated by the watermark
/// alpha and the text color's own alpha.
pub fn draw_watermark_text(
    image: &SourceImage,
    wm: &WatermarkText,
) -> Result<SourceImage, WatermarkError> {
    if wm.text.is_empty() || wm.alpha <= 0.0 {
        return Ok(image.clone());
    }

    let font = FontRef::try_from_slice(&wm.font).map_err(|_| WatermarkError::InvalidFont)?;
    let scale = PxScale::from(wm.size.max(1.0));
    let scaled = font.as_scaled(scale);

    let mut out = image.clone();
    let opacity = wm.alpha.clamp(0.0, 1.0) * (wm.color.a as f32 / 255.0);

    let mut caret = wm.x as f32;
    let baseline = wm.y as f32 + scaled.ascent();
    let mut previous: Option<ab_glyph::GlyphId> = None;

    for ch in wm.text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        previous = Some(id);

        let glyph: Glyph = id.with_scale_and_position(scale, ab_glyph::point(caret, baseline));
        caret += scaled.h_advance(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue; // whitespace and glyphs without outlines
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let px = bounds.min.x as i64 + gx as i64;
            let py = bounds.min.y as i64 + gy as i64;
            if px < 0 || py < 0 || px >= out.width as i64 || py >= out.height as i64 {
                return;
            }
            let alpha = (coverage * opacity * 255.0).round() as u8;
            if alpha == 0 {
                return;
            }
            let idx = ((py as u32 * out.width + px as u32) * 4) as usize;
            blend_over(
                &mut out.pixels[idx..idx + 4],
                [wm.color.r, wm.color.g, wm.color.b, alpha],
            );
        });
    }

    Ok(out)
}

/// Stamp an image overlay onto a copy of the base image.
///
/// The overlay is optionally resized to the requested dimensions, its
/// alpha scaled by the watermark opacity, and blended source-over at the
/// anchor. Off-canvas regions are clipped.
pub fn draw_watermark_image(image: &SourceImage, wm: &WatermarkImage) -> SourceImage {
    if wm.alpha <= 0.0 || wm.image.is_empty() {
        return image.clone();
    }

    let target_w = wm.width.unwrap_or(wm.image.width).max(1);
    let target_h = wm.height.unwrap_or(wm.image.height).max(1);
    let overlay = resize(&wm.image, target_w, target_h);

    let mut out = image.clone();
    let opacity = wm.alpha.clamp(0.0, 1.0);
    let anchor_x = wm.x.round() as i64;
    let anchor_y = wm.y.round() as i64;

    for oy in 0..overlay.height as i64 {
        let py = anchor_y + oy;
        if py < 0 || py >= out.height as i64 {
            continue;
        }
        for ox in 0..overlay.width as i64 {
            let px = anchor_x + ox;
            if px < 0 || px >= out.width as i64 {
                continue;
            }
            let src_idx = ((oy as u32 * overlay.width + ox as u32) * 4) as usize;
            let src = &overlay.pixels[src_idx..src_idx + 4];
            let alpha = (src[3] as f32 * opacity).round() as u8;
            if alpha == 0 {
                continue;
            }
            let dst_idx = ((py as u32 * out.width + px as u32) * 4) as usize;
            blend_over(&mut out.pixels[dst_idx..dst_idx + 4], [src[0], src[1], src[2], alpha]);
        }
    }
    out
}
