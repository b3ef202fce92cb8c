//! Timestamp stamp composited into the bottom-right corner of a frame.

use chrono::{DateTime, Local};
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

/// Human-readable stamp text, millisecond resolution.
pub const OVERLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const GLYPH_SIZE: i64 = 8;
const MARGIN_X: i64 = 8;
const MARGIN_Y: i64 = 6;
const PAD_X: i64 = 4;
const PAD_Y: i64 = 2;
const BACKING: Rgba<u8> = Rgba([0, 0, 0, 200]);
const INK: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub fn timestamp_text(at: &DateTime<Local>) -> String {
    at.format(OVERLAY_TIMESTAMP_FORMAT).to_string()
}

/// Draws `text` over a semi-opaque backing sized to the text. Anything that
/// falls outside the frame is clipped.
pub fn stamp_timestamp(frame: &mut RgbaImage, text: &str) {
    let chars = text.chars().count() as i64;
    if chars == 0 || frame.width() == 0 || frame.height() == 0 {
        return;
    }

    // Double-size glyphs once the frame is wide enough to hold them.
    let scale = if i64::from(frame.width()) >= chars * GLYPH_SIZE * 2 + 2 * MARGIN_X {
        2
    } else {
        1
    };
    let text_w = chars * GLYPH_SIZE * scale;
    let text_h = GLYPH_SIZE * scale;
    let x = i64::from(frame.width()) - text_w - MARGIN_X;
    let y = i64::from(frame.height()) - text_h - MARGIN_Y;

    fill_rect(frame, x - PAD_X, y - PAD_Y, text_w + 2 * PAD_X, text_h + 2 * PAD_Y, BACKING);
    draw_text(frame, x, y, text, scale, INK);
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = u32::from(src[3]);
    if a == 0 {
        return dst;
    }
    let inv = 255 - a;
    let mix = |d: u8, s: u8| ((u32::from(d) * inv + u32::from(s) * a + 127) / 255) as u8;
    let out_a = (u32::from(dst[3]) + a * (255 - u32::from(dst[3])) / 255).min(255) as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), out_a])
}

fn put(frame: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= i64::from(frame.width()) || y >= i64::from(frame.height()) {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    let dst = *frame.get_pixel(x, y);
    frame.put_pixel(x, y, blend(dst, color));
}

fn fill_rect(frame: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(i64::from(frame.width()));
    let y1 = (y + h).min(i64::from(frame.height()));
    for py in y0..y1 {
        for px in x0..x1 {
            put(frame, px, py, color);
        }
    }
}

fn draw_text(frame: &mut RgbaImage, x: i64, y: i64, text: &str, scale: i64, color: Rgba<u8>) {
    let mut cursor_x = x;
    for ch in text.chars() {
        if let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) {
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..GLYPH_SIZE {
                    if (bits >> col as u32) & 1 == 0 {
                        continue;
                    }
                    let px = cursor_x + col * scale;
                    let py = y + row as i64 * scale;
                    for sy in 0..scale {
                        for sx in 0..scale {
                            put(frame, px + sx, py + sy, color);
                        }
                    }
                }
            }
        }
        cursor_x += GLYPH_SIZE * scale;
    }
}
