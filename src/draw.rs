// Window + software drawing utilities.
// Visual layout (1280x480):
// 1) Left panel: the mirrored camera preview with the hand skeleton on top.
// 2) Right panel: the drawing surface on paper, a cursor ring and the palette strip.
// 3) A tiny 5x7 bitmap font renders the HUD text on both panels.

use crate::error::Error;
use crate::geometry::to_canvas;
use crate::types::{Color, FrameBuffer, HAND_CONNECTIONS, LandmarkSet, PALETTE};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

pub const PANEL_WIDTH: usize = 640;
pub const PANEL_HEIGHT: usize = 480;
pub const WINDOW_WIDTH: usize = PANEL_WIDTH * 2;
pub const WINDOW_HEIGHT: usize = PANEL_HEIGHT;
/// Left edge of the drawing panel.
pub const CANVAS_X: usize = PANEL_WIDTH;

pub const PAPER: u32 = 0x00_F5_F2_EA;
pub const HUD_TEXT: u32 = 0x00_FF_FF_FF;
pub const HUD_WARN: u32 = 0x00_FF_6B_6B;
const SKELETON_LINE: u32 = 0x00_00_FF_00;
const SKELETON_JOINT: u32 = 0x00_FF_00_00;
const CURSOR_RING: u32 = 0x00_FB_BF_24;

const SWATCH_W: i32 = 28;
const SWATCH_H: i32 = 16;
const SWATCH_GAP: i32 = 6;

pub struct Drawer {
    window: Window,
}

impl Drawer {
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self { window })
    }

    /// Push the pixels for this frame to the screen.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Current mouse position in window pixel coordinates (clamped to the window).
    pub fn mouse_pos(&self) -> Option<(usize, usize)> {
        self.window
            .get_mouse_pos(MouseMode::Clamp)
            .map(|(x, y)| (x.max(0.0) as usize, y.max(0.0) as usize))
    }

    pub fn left_mouse_down(&self) -> bool {
        self.window.get_mouse_down(MouseButton::Left)
    }

    pub fn pressed_once(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    /// Palette slot picked with keys 1..8 this frame.
    pub fn palette_key(&self) -> Option<usize> {
        const KEYS: [Key; 8] = [Key::Key1, Key::Key2, Key::Key3, Key::Key4, Key::Key5, Key::Key6, Key::Key7, Key::Key8];
        KEYS.iter().position(|k| self.pressed_once(*k))
    }
}

/* ---------- Software drawing: pixels, lines, markers ---------- */

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

/// Bresenham, 1 pixel wide.
pub fn draw_line(fb: &mut FrameBuffer, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
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

pub fn fill_rect(fb: &mut FrameBuffer, x: i32, y: i32, w: i32, h: i32, color: u32) {
    for yy in y..y + h {
        for xx in x..x + w {
            put_pixel(fb, xx, yy, color);
        }
    }
}

pub fn outline_rect(fb: &mut FrameBuffer, x: i32, y: i32, w: i32, h: i32, color: u32) {
    draw_line(fb, x, y, x + w - 1, y, color);
    draw_line(fb, x, y + h - 1, x + w - 1, y + h - 1, color);
    draw_line(fb, x, y, x, y + h - 1, color);
    draw_line(fb, x + w - 1, y, x + w - 1, y + h - 1, color);
}

fn fill_disc(fb: &mut FrameBuffer, cx: i32, cy: i32, r: i32, color: u32) {
    for y in -r..=r {
        for x in -r..=r {
            if x * x + y * y <= r * r {
                put_pixel(fb, cx + x, cy + y, color);
            }
        }
    }
}

/// Midpoint circle outline.
pub fn draw_ring(fb: &mut FrameBuffer, cx: i32, cy: i32, r: i32, color: u32) {
    let (mut x, mut y, mut err) = (r, 0, 1 - r);
    while x >= y {
        for (px, py) in [(x, y), (y, x), (-y, x), (-x, y), (-x, -y), (-y, -x), (y, -x), (x, -y)] {
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

/// Visual: an amber ring where the pen is, filled while drawing.
pub fn draw_cursor(fb: &mut FrameBuffer, cx: i32, cy: i32, drawing: bool, ink: Color) {
    if drawing {
        fill_disc(fb, cx, cy, 3, ink.rgb());
    }
    draw_ring(fb, cx, cy, 8, CURSOR_RING);
    draw_ring(fb, cx, cy, 9, 0x00_00_00_00);
}

/// Visual: green bones and red joints over the preview, mapped the same way as the canvas.
pub fn draw_skeleton(fb: &mut FrameBuffer, hand: &LandmarkSet, x_offset: i32, width: usize, height: usize, mirror: bool) {
    let screen: Vec<(i32, i32)> = hand
        .points()
        .iter()
        .map(|p| {
            let q = to_canvas(*p, width, height, mirror);
            (q.x.round() as i32 + x_offset, q.y.round() as i32)
        })
        .collect();
    for (a, b) in HAND_CONNECTIONS {
        let ((x0, y0), (x1, y1)) = (screen[a], screen[b]);
        draw_line(fb, x0, y0, x1, y1, SKELETON_LINE);
    }
    for (x, y) in screen {
        fill_disc(fb, x, y, 2, SKELETON_JOINT);
    }
}

/// Copy `frame` into the `dst` rectangle at (x_offset, 0), flipped horizontally
/// and resampled nearest-neighbor to `w`x`h` when sizes differ.
pub fn blit_mirrored(dst: &mut FrameBuffer, frame: &FrameBuffer, x_offset: usize, w: usize, h: usize, mirror: bool) {
    if frame.width == 0 || frame.height == 0 {
        return;
    }
    let rows = h.min(dst.height);
    let cols = w.min(dst.width.saturating_sub(x_offset));
    for y in 0..rows {
        let sy = y * frame.height / h;
        for x in 0..cols {
            let sx = x * frame.width / w;
            let sx = if mirror { frame.width - 1 - sx } else { sx };
            dst.pixels[y * dst.width + x_offset + x] = frame.pixels[sy * frame.width + sx];
        }
    }
}

/// Top-left corner of palette slot `i` inside the drawing panel.
fn swatch_origin(i: usize) -> (i32, i32) {
    let x = CANVAS_X as i32 + 8 + i as i32 * (SWATCH_W + SWATCH_GAP);
    let y = (PANEL_HEIGHT as i32) - SWATCH_H - 8;
    (x, y)
}

/// Visual: eight swatches along the bottom of the canvas; the active one is outlined.
pub fn draw_palette(fb: &mut FrameBuffer, current: Color) {
    for (i, (_, color)) in PALETTE.iter().enumerate() {
        let (x, y) = swatch_origin(i);
        fill_rect(fb, x, y, SWATCH_W, SWATCH_H, color.rgb());
        if *color == current {
            outline_rect(fb, x - 2, y - 2, SWATCH_W + 4, SWATCH_H + 4, 0x00_00_00_00);
        }
        draw_char_5x7(fb, x + SWATCH_W / 2 - 2, y + SWATCH_H / 2 - 3, char::from(b'1' + i as u8), HUD_TEXT);
    }
}

/// Palette slot under a window pixel, for clicking a swatch.
pub fn palette_hit(x: usize, y: usize) -> Option<usize> {
    let (x, y) = (x as i32, y as i32);
    (0..PALETTE.len()).find(|&i| {
        let (sx, sy) = swatch_origin(i);
        x >= sx && x < sx + SWATCH_W && y >= sy && y < sy + SWATCH_H
    })
}

/* ---------- 5x7 bitmap font ---------- */

/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch {
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
        ',' => g!(0b00000,0b00000,0b00000,0b00000,0b00110,0b00100,0b01000),
        '-' => g!(0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000),
        '/' => g!(0b00001,0b00010,0b00010,0b00100,0b01000,0b01000,0b10000),
        '(' => g!(0b00010,0b00100,0b01000,0b01000,0b01000,0b00100,0b00010),
        ')' => g!(0b01000,0b00100,0b00010,0b00010,0b00010,0b00100,0b01000),
        '#' => g!(0b01010,0b01010,0b11111,0b01010,0b11111,0b01010,0b01010),
        '!' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00000,0b00100),

        _ => None,
    }
}

/// Visual: a tiny glyph with a 1-pixel black shadow for contrast.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    let Some(rows) = glyph5x7(ch.to_ascii_uppercase()) else {
        return;
    };
    for (dx, dy, c) in [(1, 1, 0x00_00_00_00), (0, 0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    put_pixel(fb, x + rx + dx, y + ry as i32 + dy, c);
                }
            }
        }
    }
}

/// Each glyph is 5x7 with 1-pixel spacing; lowercase renders as uppercase.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GestureState, LANDMARK_COUNT, NormalizedPoint};

    #[test]
    fn hud_labels_have_glyphs() {
        let labels = [GestureState::Idle.label(), GestureState::Drawing.label(), "REFINING...", "Z UNDO | Y REDO"];
        for label in labels {
            for ch in label.chars() {
                assert!(glyph5x7(ch.to_ascii_uppercase()).is_some(), "missing glyph {ch:?}");
            }
        }
    }

    #[test]
    fn drawing_off_screen_is_clipped() {
        let mut fb = FrameBuffer::filled(4, 4, 0);
        draw_line(&mut fb, -10, -10, 10, 10, 0xFF);
        draw_ring(&mut fb, 0, 0, 20, 0xAA);
        assert_eq!(fb.pixels.len(), 16);
        assert_eq!(fb.pixels[0], 0xFF);
        assert_eq!(fb.pixels[5], 0xFF);
    }

    #[test]
    fn mirrored_blit_flips_columns() {
        let frame = FrameBuffer { width: 2, height: 1, pixels: vec![1, 2] };
        let mut dst = FrameBuffer::filled(4, 1, 0);
        blit_mirrored(&mut dst, &frame, 2, 2, 1, true);
        assert_eq!(dst.pixels, vec![0, 0, 2, 1]);
    }

    #[test]
    fn palette_swatches_are_hittable() {
        for i in 0..PALETTE.len() {
            let (x, y) = swatch_origin(i);
            assert_eq!(palette_hit(x as usize + 1, y as usize + 1), Some(i));
        }
        assert_eq!(palette_hit(0, 0), None);
    }

    #[test]
    fn skeleton_lands_inside_the_panel() {
        let hand = LandmarkSet::new([NormalizedPoint::new(0.5, 0.5); LANDMARK_COUNT]);
        let mut fb = FrameBuffer::filled(WINDOW_WIDTH, WINDOW_HEIGHT, 0);
        draw_skeleton(&mut fb, &hand, 0, PANEL_WIDTH, PANEL_HEIGHT, true);
        assert_eq!(fb.pixels[240 * WINDOW_WIDTH + 320], SKELETON_JOINT);
    }
}
