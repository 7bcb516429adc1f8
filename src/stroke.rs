// Stroke rendering: turns the gesture level plus the smoothed position into
// segments on the surface.
// Visual: a round-capped line follows the pinched hand; tiny jitters leave no marks.

use tracing::trace;

use crate::canvas::{Nib, Surface};
use crate::types::{Color, GestureState, PixelPoint};

pub const STROKE_WIDTH: f32 = 4.0;
/// Minimum movement (canvas pixels) before a segment is drawn.
pub const MOVE_THRESHOLD: f32 = 0.9;

/// Paint settings. The color is read each time a segment is drawn, so a
/// color change mid-stroke affects the following segments of that stroke.
pub struct Pen {
    pub color: Color,
    nib: Nib,
}

impl Pen {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, nib: Nib::round(width) }
    }
}

impl Default for Pen {
    fn default() -> Self {
        Self::new(Color::default(), STROKE_WIDTH)
    }
}

/// Result of one render step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStep {
    /// Where the next segment starts; `None` means the next Drawing frame begins a fresh path.
    pub previous: Option<PixelPoint>,
    /// A visible segment was drawn this step.
    pub drew: bool,
}

/// One step of the renderer.
///
/// - Idle: nothing drawn, continuity dropped.
/// - Drawing with no previous point: the path starts here, no pixels yet.
/// - Drawing with a previous point: a segment is drawn only when the move
///   exceeds `move_threshold`. Below it the previous point is kept, so slow
///   motion accumulates until it crosses the threshold.
pub fn render(
    surface: &mut Surface,
    gesture: GestureState,
    previous: Option<PixelPoint>,
    current: PixelPoint,
    pen: &Pen,
    move_threshold: f32,
) -> StrokeStep {
    match (gesture, previous) {
        (GestureState::Idle, _) => StrokeStep { previous: None, drew: false },
        (GestureState::Drawing, None) => StrokeStep { previous: Some(current), drew: false },
        (GestureState::Drawing, Some(prev)) => {
            if prev.distance_to(current) > move_threshold {
                surface.stroke_line(prev, current, &pen.nib, pen.color);
                trace!(?prev, ?current, "segment");
                StrokeStep { previous: Some(current), drew: true }
            } else {
                StrokeStep { previous: Some(prev), drew: false }
            }
        }
    }
}
