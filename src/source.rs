// Landmark sources: whatever turns a camera frame into zero-or-one hands.
// The real hand model is external; these are the two sources the app ships
// with. `PointerHand` fakes a hand from the mouse (button held = pinch) and
// `ReplaySource` plays back a recorded session, one detection per line.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::Error;
use crate::types::{
    FrameBuffer, INDEX_DIP, INDEX_MCP, INDEX_PIP, INDEX_TIP, LANDMARK_COUNT, LandmarkSet, MIDDLE_DIP, MIDDLE_MCP,
    MIDDLE_PIP, MIDDLE_TIP, NormalizedPoint, PINKY_DIP, PINKY_MCP, PINKY_PIP, PINKY_TIP, RING_DIP, RING_MCP,
    RING_PIP, RING_TIP, THUMB_CMC, THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
};

/// Produces at most one hand per frame (max hands = 1).
pub trait LandmarkSource {
    fn detect(&mut self, frame: &FrameBuffer) -> Result<Option<LandmarkSet>, Error>;

    /// Release whatever the source holds; no detections are expected afterwards.
    fn close(&mut self) {}
}

/* --- pointer --- */

/// A synthetic hand that follows the pointer.
/// Visual: the thumb tip sits under the mouse; holding the button brings the
/// index tip onto the thumb (a pinch), releasing spreads them apart.
pub struct PointerHand {
    mirror: bool,
    pointer: Option<NormalizedPoint>,
    pinched: bool,
}

impl PointerHand {
    pub fn new(mirror: bool) -> Self {
        Self { mirror, pointer: None, pinched: false }
    }

    /// `pos` is in canvas-normalized space ([0,1] on both axes of the drawing panel);
    /// None when the pointer is off the canvas.
    pub fn set_pointer(&mut self, pos: Option<NormalizedPoint>, pinched: bool) {
        self.pointer = pos;
        self.pinched = pinched;
    }

    fn hand_at(&self, canvas_pos: NormalizedPoint) -> LandmarkSet {
        // Undo the canvas mirror so the session maps the thumb back under the pointer.
        let thumb = if self.mirror { NormalizedPoint::new(1.0 - canvas_pos.x, canvas_pos.y) } else { canvas_pos };
        let at = |dx: f32, dy: f32| NormalizedPoint::new(thumb.x + dx, thumb.y + dy);

        let wrist = at(0.06, 0.22);
        let index_tip = if self.pinched { at(0.015, -0.01) } else { at(0.03, -0.15) };
        let tips = [
            (INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP, index_tip),
            (MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP, at(0.07, -0.16)),
            (RING_MCP, RING_PIP, RING_DIP, RING_TIP, at(0.11, -0.13)),
            (PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP, at(0.15, -0.08)),
        ];

        let mut points = [NormalizedPoint::default(); LANDMARK_COUNT];
        points[WRIST] = wrist;
        points[THUMB_CMC] = lerp(wrist, thumb, 0.25);
        points[THUMB_MCP] = lerp(wrist, thumb, 0.5);
        points[THUMB_IP] = lerp(wrist, thumb, 0.75);
        points[THUMB_TIP] = thumb;
        for (mcp, pip, dip, tip, tip_pos) in tips {
            points[mcp] = lerp(wrist, tip_pos, 0.45);
            points[pip] = lerp(wrist, tip_pos, 0.65);
            points[dip] = lerp(wrist, tip_pos, 0.82);
            points[tip] = tip_pos;
        }
        LandmarkSet::new(points)
    }
}

fn lerp(a: NormalizedPoint, b: NormalizedPoint, t: f32) -> NormalizedPoint {
    NormalizedPoint::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

impl LandmarkSource for PointerHand {
    fn detect(&mut self, _frame: &FrameBuffer) -> Result<Option<LandmarkSet>, Error> {
        Ok(self.pointer.map(|p| self.hand_at(p)))
    }
}

/* --- replay --- */

/// One line of a recording: `{"landmarks": [[x, y], ...]}` or `{"landmarks": null}`.
#[derive(Debug, Deserialize)]
struct RecordedDetection {
    #[serde(default)]
    landmarks: Option<Vec<[f32; 2]>>,
}

/// Plays back a JSON Lines recording, one detection per frame.
pub struct ReplaySource {
    lines: Lines<Box<dyn BufRead>>,
    line_no: usize,
    finished: bool,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        info!(path = %path.display(), "replaying landmarks");
        Ok(Self::from_reader(BufReader::new(file)))
    }

    pub fn from_reader(reader: impl BufRead + 'static) -> Self {
        let boxed: Box<dyn BufRead> = Box::new(reader);
        Self { lines: boxed.lines(), line_no: 0, finished: false }
    }

    /// True once the recording has run out; every later frame is "no hand".
    pub fn finished(&self) -> bool {
        self.finished
    }
}

impl LandmarkSource for ReplaySource {
    fn detect(&mut self, _frame: &FrameBuffer) -> Result<Option<LandmarkSet>, Error> {
        if self.finished {
            return Ok(None);
        }
        let Some(line) = self.lines.next() else {
            self.finished = true;
            info!(frames = self.line_no, "replay finished");
            return Ok(None);
        };
        self.line_no += 1;
        let line = line?;
        if line.trim().is_empty() {
            return Ok(None);
        }
        let record: RecordedDetection = serde_json::from_str(&line)
            .map_err(|e| Error::Landmarks(format!("line {}: {e}", self.line_no)))?;
        match record.landmarks {
            None => Ok(None),
            Some(raw) => {
                let points = raw.into_iter().map(|[x, y]| NormalizedPoint::new(x, y)).collect::<Vec<_>>();
                LandmarkSet::try_from(points)
                    .map(Some)
                    .map_err(|e| Error::Landmarks(format!("line {}: {e}", self.line_no)))
            }
        }
    }

    fn close(&mut self) {
        self.finished = true;
    }
}
