// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bitmap text rendering for watermarks and barcode captions. Glyphs come from
// the 8x8 `font8x8` tables and are scaled by pixel replication.

use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use wandelwerk_core::Anchor;
use wandelwerk_core::color::{BLACK, WHITE};

/// Side length of one unscaled glyph cell.
pub const GLYPH_SIZE: u32 = 8;

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Pixel extent of `text` at the given integer scale.
pub fn text_extent(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    (chars * GLYPH_SIZE * scale, GLYPH_SIZE * scale)
}

/// Alpha-blend `color` at `opacity` onto one pixel.
pub fn blend_pixel(dst: &mut Rgba<u8>, color: Rgba<u8>, opacity: f32) {
    let alpha = (opacity * f32::from(color[3]) / 255.0).clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let src = f32::from(color[channel]);
        let below = f32::from(dst[channel]);
        dst[channel] = (src * alpha + below * (1.0 - alpha)).round() as u8;
    }
    let below_a = f32::from(dst[3]) / 255.0;
    dst[3] = ((alpha + below_a * (1.0 - alpha)) * 255.0).round() as u8;
}

/// Draw `text` with its top-left corner at (`x`, `y`). Pixels falling outside
/// the canvas are clipped.
pub fn draw_text(
    canvas: &mut RgbaImage,
    text: &str,
    x: i64,
    y: i64,
    scale: u32,
    color: Rgba<u8>,
    opacity: f32,
) {
    let scale = scale.max(1) as i64;
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);

    for (index, ch) in text.chars().enumerate() {
        let rows = glyph(ch);
        let origin_x = x + index as i64 * GLYPH_SIZE as i64 * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..8 {
                // Bit 0 is the leftmost pixel.
                if bits & (1 << col) == 0 {
                    continue;
                }
                let px = origin_x + col as i64 * scale;
                let py = y + row as i64 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (cx, cy) = (px + dx, py + dy);
                        if cx < 0 || cy < 0 || cx >= width || cy >= height {
                            continue;
                        }
                        blend_pixel(canvas.get_pixel_mut(cx as u32, cy as u32), color, opacity);
                    }
                }
            }
        }
    }
}

/// Glyph scale for a watermark on a `width` x `height` canvas: glyph height
/// targets `size_ratio` of the shorter side, shrunk if the text would not fit
/// across the canvas.
pub fn watermark_scale(text: &str, width: u32, height: u32, size_ratio: f32) -> u32 {
    let target = (width.min(height) as f32 * size_ratio).round();
    let mut scale = ((target / GLYPH_SIZE as f32).round() as u32).max(1);
    while scale > 1 && text_extent(text, scale).0 > width {
        scale -= 1;
    }
    scale
}

/// Top-left position of a block of `block_w` x `block_h` at `anchor`, with
/// `margin` pixels of padding from the edges.
pub fn anchor_position(
    anchor: Anchor,
    canvas_w: u32,
    canvas_h: u32,
    block_w: u32,
    block_h: u32,
    margin: u32,
) -> (i64, i64) {
    let (cw, ch, bw, bh, m) = (
        canvas_w as i64,
        canvas_h as i64,
        block_w as i64,
        block_h as i64,
        margin as i64,
    );
    match anchor {
        Anchor::Center => ((cw - bw) / 2, (ch - bh) / 2),
        Anchor::TopLeft => (m, m),
        Anchor::TopRight => (cw - bw - m, m),
        Anchor::BottomLeft => (m, ch - bh - m),
        Anchor::BottomRight => (cw - bw - m, ch - bh - m),
    }
}

/// White watermark text with a black drop shadow.
pub fn draw_watermark(
    canvas: &mut RgbaImage,
    text: &str,
    opacity: f32,
    anchor: Anchor,
    size_ratio: f32,
) {
    let (width, height) = canvas.dimensions();
    let scale = watermark_scale(text, width, height, size_ratio);
    let (text_w, text_h) = text_extent(text, scale);
    let margin = text_h / 2;
    let (x, y) = anchor_position(anchor, width, height, text_w, text_h, margin);
    let shadow = (scale / 2).max(1) as i64;

    draw_text(canvas, text, x + shadow, y + shadow, scale, BLACK, opacity * 0.6);
    draw_text(canvas, text, x, y, scale, WHITE, opacity);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_scales_with_length() {
        assert_eq!(text_extent("ABC", 2), (48, 16));
        assert_eq!(text_extent("", 3), (0, 24));
    }

    #[test]
    fn scale_targets_five_percent_of_short_side() {
        // 5% of 800 = 40px glyphs -> scale 5
        assert_eq!(watermark_scale("Hi", 1000, 800, 0.05), 5);
        // Long text shrinks to fit the width.
        let long = "x".repeat(40);
        assert!(text_extent(&long, watermark_scale(&long, 400, 400, 0.2)).0 <= 400);
    }

    #[test]
    fn drawing_changes_pixels_inside_bounds_only() {
        let mut canvas = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 0, 255]));
        draw_text(&mut canvas, "H", 2, 2, 2, WHITE, 1.0);
        let lit = canvas.pixels().filter(|p| p.0[0] == 255).count();
        assert!(lit > 0);
        // Entirely off-canvas text is clipped without panicking.
        draw_text(&mut canvas, "HELLO", -500, -500, 3, WHITE, 1.0);
        draw_text(&mut canvas, "HELLO", 39, 19, 3, WHITE, 1.0);
    }

    #[test]
    fn zero_opacity_is_invisible() {
        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([7, 7, 7, 255]));
        draw_watermark(&mut canvas, "TEST", 0.0, Anchor::Center, 0.5);
        assert!(canvas.pixels().all(|p| p.0 == [7, 7, 7, 255]));
    }

    #[test]
    fn corner_anchors_respect_margin() {
        assert_eq!(anchor_position(Anchor::TopLeft, 100, 50, 20, 10, 5), (5, 5));
        assert_eq!(anchor_position(Anchor::BottomRight, 100, 50, 20, 10, 5), (75, 35));
        assert_eq!(anchor_position(Anchor::Center, 100, 50, 20, 10, 5), (40, 20));
    }
}
