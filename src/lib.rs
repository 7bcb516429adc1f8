// Draw on a canvas with hand gestures.
//
// A landmark source reports at most one hand per frame. The `Session`
// classifies it (pinch = drawing), smooths the thumb tip into canvas space,
// stamps strokes, keeps a bounded undo/redo history of PNG snapshots and can
// hand the canvas to a remote refinement service.

pub mod camera;
pub mod canvas;
pub mod config;
pub mod draw;
pub mod error;
pub mod gamma;
pub mod geometry;
pub mod gesture;
pub mod history;
pub mod refine;
pub mod session;
pub mod source;
pub mod stroke;
pub mod types;
