// Core value types shared by the classifier, renderer, session and window.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Camera frames and the on-screen image.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is on screen (pixels)
    pub height: usize,     // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    /// A frame filled with one color.
    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Self { width, height, pixels: vec![color; width * height] }
    }
}

/* --- landmarks --- */

/// A keypoint in detector space: both axes in [0,1], origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Bone connections used for the skeleton overlay.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC), (THUMB_CMC, THUMB_MCP), (THUMB_MCP, THUMB_IP), (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP), (INDEX_MCP, INDEX_PIP), (INDEX_PIP, INDEX_DIP), (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP), (MIDDLE_MCP, MIDDLE_PIP), (MIDDLE_PIP, MIDDLE_DIP), (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP), (RING_MCP, RING_PIP), (RING_PIP, RING_DIP), (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP), (PINKY_MCP, PINKY_PIP), (PINKY_PIP, PINKY_DIP), (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

/// One detected hand: 21 keypoints in anatomical order (0 = wrist, 4 = thumb tip, 8 = index tip, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [NormalizedPoint; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [NormalizedPoint; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[NormalizedPoint; LANDMARK_COUNT] {
        &self.points
    }

    pub fn thumb_tip(&self) -> NormalizedPoint {
        self.points[THUMB_TIP]
    }

    pub fn index_tip(&self) -> NormalizedPoint {
        self.points[INDEX_TIP]
    }
}

impl TryFrom<Vec<NormalizedPoint>> for LandmarkSet {
    type Error = Error;

    fn try_from(points: Vec<NormalizedPoint>) -> Result<Self, Error> {
        let len = points.len();
        let points: [NormalizedPoint; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| Error::Landmarks(format!("expected {LANDMARK_COUNT} landmarks, got {len}")))?;
        Ok(Self { points })
    }
}

/* --- canvas space --- */

/// A position in canvas pixel space (post scale/flip). Fractional on purpose: smoothing runs in f32.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: PixelPoint) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Discrete gesture level evaluated once per detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureState {
    #[default]
    Idle,
    Drawing,
}

impl GestureState {
    /// HUD label while a hand is visible.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE (PINCH TO DRAW)",
            Self::Drawing => "DRAWING MODE",
        }
    }
}

/* --- color --- */

/// Stroke paint, packed 0xAARRGGBB. Parsed colors are always opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

/// The swatches offered by the window (keys 1–8).
pub const PALETTE: [(&str, Color); 8] = [
    ("red", Color(0xFF_FF_00_00)),
    ("green", Color(0xFF_00_80_00)),
    ("blue", Color(0xFF_00_00_FF)),
    ("purple", Color(0xFF_80_00_80)),
    ("orange", Color(0xFF_FF_A5_00)),
    ("pink", Color(0xFF_FF_C0_CB)),
    ("brown", Color(0xFF_A5_2A_2A)),
    ("gray", Color(0xFF_80_80_80)),
];

impl Color {
    pub const PURPLE: Color = Color(0xFF_80_00_80);

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(0xFF00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    /// Same color without alpha, for the 0x00RRGGBB screen buffer.
    pub fn rgb(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::PURPLE
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized color: {0}")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        if let Some(hex) = raw.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ParseColorError(s.to_string()));
        }
        match raw.as_str() {
            "black" => Ok(Color::from_rgb(0, 0, 0)),
            "white" => Ok(Color::from_rgb(255, 255, 255)),
            name => PALETTE
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, c)| *c)
                .ok_or_else(|| ParseColorError(s.to_string())),
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (slot, ch) in rgb.iter_mut().zip(hex.chars()) {
                *slot = ch.to_digit(16)? as u8 * 17; // #abc == #aabbcc
            }
            Some(Color::from_rgb(rgb[0], rgb[1], rgb[2]))
        }
        6 => u32::from_str_radix(hex, 16).ok().map(|v| Color(0xFF00_0000 | v)),
        _ => None,
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match PALETTE.iter().find(|(_, c)| c == self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "#{:06x}", self.rgb()),
        }
    }
}
