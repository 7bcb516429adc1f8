// Pure 2-D helpers: distance, exponential smoothing and the two coordinate
// mappings (detector space -> canvas pixels, canvas pixels -> display pixels).

use crate::types::{NormalizedPoint, PixelPoint};

/// Euclidean distance between two detector-space points.
pub fn distance(a: NormalizedPoint, b: NormalizedPoint) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Exponential smoothing toward `raw`.
///
/// `prev == None` is the cold start: the raw position is returned unchanged.
/// Otherwise each axis moves `factor` of the way from `prev` to `raw`;
/// `factor` in (0,1], higher = more responsive, less smooth.
pub fn smooth(prev: Option<PixelPoint>, raw: PixelPoint, factor: f32) -> PixelPoint {
    match prev {
        None => raw,
        Some(p) => PixelPoint::new(p.x + factor * (raw.x - p.x), p.y + factor * (raw.y - p.y)),
    }
}

/// Map a detector point into canvas pixels.
/// Visual: with `mirror` on, moving your hand to the right moves the ink to the right
/// (the camera image is a mirror of you).
pub fn to_canvas(p: NormalizedPoint, width: usize, height: usize, mirror: bool) -> PixelPoint {
    let x = if mirror { 1.0 - p.x } else { p.x };
    PixelPoint::new(x * width as f32, p.y * height as f32)
}

/// Scale a canvas-pixel position to a displayed size (window panels may be stretched).
pub fn to_display(p: PixelPoint, logical: (usize, usize), displayed: (usize, usize)) -> PixelPoint {
    let sx = displayed.0 as f32 / logical.0.max(1) as f32;
    let sy = displayed.1 as f32 / logical.1.max(1) as f32;
    PixelPoint::new(p.x * sx, p.y * sy)
}
