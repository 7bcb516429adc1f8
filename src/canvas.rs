// The drawing surface: an ARGB pixel buffer that strokes are stamped into,
// snapshotted as PNG for history, shipped as a data: URI for refinement and
// composited onto the window each frame.

use std::fmt;
use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};

use crate::error::Error;
use crate::gamma::GammaLut;
use crate::types::{Color, FrameBuffer, PixelPoint};

/// Fully transparent: what a cleared surface is made of.
pub const BLANK: u32 = 0x0000_0000;

/// Mutable pixel buffer being drawn on. Each entry is 0xAARRGGBB.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl fmt::Debug for Surface {
    // The pixel vector is far too long to be useful in assertion output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inked = self.pixels.iter().filter(|p| **p != BLANK).count();
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("inked", &inked)
            .finish()
    }
}

impl Surface {
    /// A blank (transparent) surface.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![BLANK; width * height] }
    }

    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self, Error> {
        if pixels.len() != width * height {
            return Err(Error::Surface(format!(
                "{} pixels do not fill {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y * self.width + x])
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|p| *p == BLANK)
    }

    /// Visual: the whole canvas goes back to empty paper.
    pub fn clear(&mut self) {
        self.pixels.fill(BLANK);
    }

    #[inline]
    fn put_pixel(&mut self, x: i32, y: i32, argb: u32) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return;
        }
        self.pixels[y * self.width + x] = argb;
    }

    /// Stamp the nib centered at (cx, cy).
    pub fn dab(&mut self, cx: i32, cy: i32, nib: &Nib, color: Color) {
        for &(dx, dy) in &nib.offsets {
            self.put_pixel(cx + dx, cy + dy, color.0);
        }
    }

    /// Draw a segment with round caps and joins: the nib is stamped at every
    /// Bresenham step between the two (rounded) endpoints.
    /// Visual: a solid line of the nib's width appears; consecutive segments
    /// meet without gaps because each one starts with a full round dab.
    pub fn stroke_line(&mut self, from: PixelPoint, to: PixelPoint, nib: &Nib, color: Color) {
        let (mut x0, mut y0) = (from.x.round() as i32, from.y.round() as i32);
        let (x1, y1) = (to.x.round() as i32, to.y.round() as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.dab(x0, y0, nib, color);
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

    /* --- serialization --- */

    /// Lossless PNG capture (RGBA8).
    pub fn encode_png(&self) -> Result<Vec<u8>, Error> {
        let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
        for &p in &self.pixels {
            rgba.extend_from_slice(&[(p >> 16) as u8, (p >> 8) as u8, p as u8, (p >> 24) as u8]);
        }
        let img = RgbaImage::from_raw(self.width as u32, self.height as u32, rgba)
            .ok_or_else(|| Error::Surface("pixel buffer smaller than its dimensions".into()))?;
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
        Ok(out)
    }

    /// Decode any bitmap the `image` crate understands, scaled to `width`x`height`.
    pub fn decode(bytes: &[u8], width: usize, height: usize) -> Result<Self, Error> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let img = if img.width() as usize != width || img.height() as usize != height {
            imageops::resize(&img, width as u32, height as u32, FilterType::Triangle)
        } else {
            img
        };
        let pixels = img
            .pixels()
            .map(|px| {
                let [r, g, b, a] = px.0;
                (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
            })
            .collect();
        Self::from_pixels(width, height, pixels)
    }

    /* --- presentation --- */

    /// Alpha-blend the surface over `dst` starting at column `x_offset`, in linear light.
    /// Visual: ink sits on top of the paper; soft edges from a refined image stay soft.
    pub fn composite_onto(&self, dst: &mut FrameBuffer, x_offset: usize, lut: &GammaLut) {
        let rows = self.height.min(dst.height);
        let cols = self.width.min(dst.width.saturating_sub(x_offset));
        for y in 0..rows {
            for x in 0..cols {
                let src = self.pixels[y * self.width + x];
                let a = (src >> 24) & 0xFF;
                if a == 0 {
                    continue;
                }
                let idx = y * dst.width + x + x_offset;
                if a == 0xFF {
                    dst.pixels[idx] = src & 0x00FF_FFFF;
                    continue;
                }
                dst.pixels[idx] = lut.mix_rgb(src, dst.pixels[idx], a as f32 / 255.0);
            }
        }
    }
}

/// Round brush footprint: pixel offsets inside a disc of the given width.
pub struct Nib {
    offsets: Vec<(i32, i32)>,
}

impl Nib {
    pub fn round(width: f32) -> Self {
        let radius = (width / 2.0).max(0.5);
        let reach = radius.ceil() as i32;
        let r2 = radius * radius;
        let mut offsets = Vec::new();
        for y in -reach..=reach {
            for x in -reach..=reach {
                if (x * x + y * y) as f32 <= r2 {
                    offsets.push((x, y));
                }
            }
        }
        Self { offsets }
    }
}

/* --- data: URIs --- */

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Payload of a base64 `data:image/...` URI, or None if `uri` is not one.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    if !mime.starts_with("image/") {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: Color = Color(0xFF_12_34_56);

    #[test]
    fn stroke_line_covers_the_segment_with_width() {
        let mut s = Surface::new(64, 32);
        s.stroke_line(PixelPoint::new(10.0, 10.0), PixelPoint::new(40.0, 10.0), &Nib::round(4.0), INK);
        for x in 10..=40 {
            assert_eq!(s.pixel(x, 10), Some(INK.0), "gap at x={x}");
        }
        // Width 4: two pixels above and below the center line, nothing beyond.
        assert_eq!(s.pixel(25, 12), Some(INK.0));
        assert_eq!(s.pixel(25, 8), Some(INK.0));
        assert_eq!(s.pixel(25, 13), Some(BLANK));
        // Round cap reaches past the end point.
        assert_eq!(s.pixel(42, 10), Some(INK.0));
        assert_eq!(s.pixel(44, 10), Some(BLANK));
    }

    #[test]
    fn strokes_clip_at_edges() {
        let mut s = Surface::new(8, 8);
        s.stroke_line(PixelPoint::new(-5.0, -5.0), PixelPoint::new(20.0, 20.0), &Nib::round(4.0), INK);
        assert_eq!(s.pixel(0, 0), Some(INK.0));
        assert_eq!(s.pixel(7, 7), Some(INK.0));
    }

    #[test]
    fn png_capture_restores_exactly() {
        let mut s = Surface::new(32, 24);
        s.stroke_line(PixelPoint::new(2.0, 3.0), PixelPoint::new(30.0, 20.0), &Nib::round(4.0), INK);
        let png = s.encode_png().unwrap();
        assert_eq!(Surface::decode(&png, 32, 24).unwrap(), s);
    }

    #[test]
    fn decode_scales_to_requested_size() {
        let mut small = Surface::new(16, 12);
        small.pixels.fill(0xFF_FF_00_00);
        let png = small.encode_png().unwrap();
        let big = Surface::decode(&png, 64, 48).unwrap();
        assert_eq!((big.width(), big.height()), (64, 48));
        assert!(big.pixels().iter().all(|p| *p == 0xFF_FF_00_00));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(Surface::decode(b"not an image", 4, 4), Err(Error::Image(_))));
    }

    #[test]
    fn data_uri_round_trip_and_rejects() {
        let uri = encode_data_uri("image/png", b"\x89PNG");
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"\x89PNG");

        assert!(decode_data_uri("https://example.com/a.png").is_none());
        assert!(decode_data_uri("data:text/plain;base64,aGk=").is_none());
        assert!(decode_data_uri("data:image/png,raw").is_none());
    }

    #[test]
    fn composite_skips_transparent_and_copies_opaque() {
        let mut s = Surface::new(4, 1);
        s.pixels[1] = 0xFF_00_FF_00;
        let mut screen = FrameBuffer::filled(8, 1, 0x00_20_20_20);
        s.composite_onto(&mut screen, 4, &GammaLut::new());
        assert_eq!(screen.pixels[4], 0x00_20_20_20);
        assert_eq!(screen.pixels[5], 0x00_00_FF_00);
        assert_eq!(screen.pixels[1], 0x00_20_20_20);
    }

    #[test]
    fn clear_blanks_everything() {
        let mut s = Surface::new(8, 8);
        s.dab(4, 4, &Nib::round(4.0), INK);
        assert!(!s.is_blank());
        s.clear();
        assert!(s.is_blank());
    }
}
