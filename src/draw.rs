// Window + software drawing utilities.
// What ends up on screen besides the image itself:
// 1) A window sized to the loaded picture.
// 2) The brush outline and a crosshair that follow the mouse.
// 3) A magnifier box showing the area under the cursor at 2.3x.
// 4) A tiny 5x7 bitmap font for the HUD line.

use crate::error::{Error, Result};
use crate::types::{FrameBuffer, pack_rgb};
use image::RgbaImage;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

/// Side of the magnifier box in screen pixels.
pub const MAGNIFIER_SIZE: usize = 200;
pub const MAGNIFIER_ZOOM: f32 = 2.3;
const MAGNIFIER_BACKDROP: u32 = 0x00_14_14_14;
const MAGNIFIER_BORDER: u32 = 0x00_FF_FF_FF;

pub struct Drawer {
    window: Window,
}

impl Drawer {
    /// Create a window sized to the image being edited.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self { window })
    }

    /// Push this frame's pixels to the screen.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<()> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// False once the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Mouse position in image pixels, or None while the pointer is outside
    /// the window. Leaving the window ends a drag.
    pub fn mouse_pos(&self) -> Option<(f32, f32)> {
        self.window.get_mouse_pos(MouseMode::Discard)
    }

    pub fn left_mouse_down(&self) -> bool {
        self.window.get_mouse_down(MouseButton::Left)
    }

    /// True on the frame a key goes down; held keys do not repeat.
    pub fn pressed_once(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }
}

/* ---------- Software drawing: pixels, lines, circles, crosshair ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
pub fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Bresenham line between (x0,y0) and (x1,y1), clipped per pixel.
fn draw_line(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(fb, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// One-pixel circle outline (midpoint algorithm). Used for the brush footprint.
pub fn draw_circle(fb: &mut FrameBuffer, cx: i32, cy: i32, r: i32, color: u32) {
    if r <= 0 {
        put_pixel(fb, cx, cy, color);
        return;
    }
    let (mut x, mut y) = (r, 0);
    let mut err = 1 - r;
    while x >= y {
        for (px, py) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            put_pixel(fb, cx + px, cy + py, color);
        }
        y += 1;
        if err < 0 {
            err += 2 * y + 1;
        } else {
            x -= 1;
            err += 2 * (y - x) + 1;
        }
    }
}

/// Small "+" centred at (cx,cy), with a gap around the centre dot.
pub fn draw_crosshair(fb: &mut FrameBuffer, cx: i32, cy: i32, size: i32, color: u32) {
    draw_line(fb, cx - size, cy, cx - 2, cy, color);
    draw_line(fb, cx + 2, cy, cx + size, cy, color);
    draw_line(fb, cx, cy - size, cx, cy - 2, color);
    draw_line(fb, cx, cy + 2, cx, cy + size, color);
    put_pixel(fb, cx, cy, color);
}

fn draw_rect_outline(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    draw_line(fb, x0, y0, x1, y0, color);
    draw_line(fb, x1, y0, x1, y1, color);
    draw_line(fb, x1, y1, x0, y1, color);
    draw_line(fb, x0, y1, x0, y0, color);
}

/// Where the magnifier box goes: the top-right corner, or top-left when the
/// cursor is inside the top-right box.
pub fn magnifier_origin(fb_width: usize, cx: f32, cy: f32) -> (i32, i32) {
    let margin = 8i32;
    let size = MAGNIFIER_SIZE as i32;
    let right = fb_width as i32 - size - margin;
    let over_right = cx >= right as f32 && cy <= (margin + size) as f32;
    if over_right { (margin, margin + 16) } else { (right.max(0), margin + 16) }
}

/// Zoomed view of `img` around (cx,cy), drawn with its top-left at (ox,oy).
/// Samples that fall outside the image show a dark backdrop.
pub fn draw_magnifier(fb: &mut FrameBuffer, img: &RgbaImage, cx: f32, cy: f32, ox: i32, oy: i32) {
    let half = MAGNIFIER_SIZE as f32 / 2.0;
    for py in 0..MAGNIFIER_SIZE {
        for px in 0..MAGNIFIER_SIZE {
            let sx = (cx + (px as f32 - half) / MAGNIFIER_ZOOM).floor();
            let sy = (cy + (py as f32 - half) / MAGNIFIER_ZOOM).floor();
            let color = if sx >= 0.0 && sy >= 0.0 && sx < img.width() as f32 && sy < img.height() as f32 {
                let p = img.get_pixel(sx as u32, sy as u32);
                pack_rgb(p[0], p[1], p[2])
            } else {
                MAGNIFIER_BACKDROP
            };
            put_pixel(fb, ox + px as i32, oy + py as i32, color);
        }
    }
    let s = MAGNIFIER_SIZE as i32;
    draw_rect_outline(fb, ox - 1, oy - 1, ox + s, oy + s, MAGNIFIER_BORDER);
    draw_crosshair(fb, ox + s / 2, oy + s / 2, 6, MAGNIFIER_BORDER);
}

/* ---------- 5x7 bitmap font ---------- */

/// 5x7 glyph bitmap. Each u8 is a row; the low 5 bits are the pixels
/// (bit 4 = leftmost). Lowercase is drawn as uppercase.
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'B' => g!(0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'H' => g!(0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'J' => g!(0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100),
        'K' => g!(0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'Q' => g!(0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'V' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100),
        'W' => g!(0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010),
        'X' => g!(0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001),
        'Y' => g!(0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100),
        'Z' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),
        '/' => g!(0b00001,0b00001,0b00010,0b00100,0b01000,0b10000,0b10000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '=' => g!(0b00000,0b00000,0b11111,0b00000,0b11111,0b00000,0b00000),
        '[' => g!(0b01110,0b01000,0b01000,0b01000,0b01000,0b01000,0b01110),
        ']' => g!(0b01110,0b00010,0b00010,0b00010,0b00010,0b00010,0b01110),

        _ => None,
    }
}

/// One 5x7 character at (x,y) with a 1-pixel black shadow for contrast.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    if let Some(rows) = glyph5x7(ch) {
        for (pass_color, shift) in [(0x00000000, 1), (color, 0)] {
            for (ry, rowbits) in rows.iter().enumerate() {
                for rx in 0..5 {
                    if (rowbits & (1 << (4 - rx))) != 0 {
                        put_pixel(fb, x + rx + shift, y + ry as i32 + shift, pass_color);
                    }
                }
            }
        }
    }
}

/// HUD string; each glyph is 5 pixels wide with 1 pixel of spacing.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn put_pixel_ignores_out_of_bounds() {
        let mut fb = FrameBuffer::new(3, 3);
        put_pixel(&mut fb, -1, 0, 7);
        put_pixel(&mut fb, 3, 1, 7);
        put_pixel(&mut fb, 1, 1, 7);
        assert_eq!(fb.pixels.iter().filter(|&&p| p == 7).count(), 1);
        assert_eq!(fb.pixels[4], 7);
    }

    #[test]
    fn circle_hits_the_four_extremes() {
        let mut fb = FrameBuffer::new(21, 21);
        draw_circle(&mut fb, 10, 10, 6, 1);
        for (x, y) in [(16, 10), (4, 10), (10, 16), (10, 4)] {
            assert_eq!(fb.pixels[y * 21 + x], 1, "missing ({x},{y})");
        }
        assert_eq!(fb.pixels[10 * 21 + 10], 0);
    }

    #[test]
    fn every_letter_and_hud_symbol_has_a_glyph() {
        for ch in ('A'..='Z').chain('a'..='z').chain("0123456789 |:./-=[]".chars()) {
            assert!(glyph5x7(ch).is_some(), "no glyph for {ch:?}");
        }
    }

    #[test]
    fn magnifier_centre_shows_the_cursor_pixel() {
        let img = RgbaImage::from_fn(50, 50, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut fb = FrameBuffer::new(300, 300);
        draw_magnifier(&mut fb, &img, 20.0, 30.0, 10, 10);
        // pixel right of the crosshair centre dot
        let idx = (10 + MAGNIFIER_SIZE / 2) * 300 + (10 + MAGNIFIER_SIZE / 2 + 1);
        assert_eq!(fb.pixels[idx], pack_rgb(20, 30, 0));
    }

    #[test]
    fn magnifier_backdrop_outside_image() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let mut fb = FrameBuffer::new(300, 300);
        draw_magnifier(&mut fb, &img, 0.0, 0.0, 0, 0);
        assert_eq!(fb.pixels[5 * 300 + 5], MAGNIFIER_BACKDROP);
    }

    #[test]
    fn magnifier_moves_away_from_cursor() {
        let (ox, _) = magnifier_origin(640, 600.0, 50.0);
        assert_eq!(ox, 8);
        let (ox, _) = magnifier_origin(640, 100.0, 50.0);
        assert_eq!(ox, 640 - 200 - 8);
    }
}
