// Command line / environment configuration for the windowed app.
//
// Usage examples:
//   gesture-canvas                                   (camera 0, draw with the mouse as a stand-in hand)
//   gesture-canvas --no-camera --color "#1e90ff"
//   gesture-canvas --replay session.jsonl
//   GESTURE_CANVAS_REFINE_URL=https://refine.example/api gesture-canvas

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use crate::gesture::{GestureConfig, PINCH_THRESHOLD};
use crate::refine::{DEFAULT_REFINE_CONNECT_TIMEOUT_SECS, DEFAULT_REFINE_TIMEOUT_SECS, HttpRefiner, RefineError, Refiner};
use crate::session::{SMOOTHING, SessionConfig};
use crate::stroke::MOVE_THRESHOLD;
use crate::types::Color;

/// Draw on a canvas with hand gestures: pinch thumb and index finger to draw.
#[derive(Parser, Debug)]
#[command(name = "gesture-canvas", version)]
pub struct Args {
    /// Camera device index.
    #[arg(long, default_value_t = 0, env = "GESTURE_CANVAS_CAMERA")]
    pub camera: u32,

    /// Run without a camera (blank preview).
    #[arg(long)]
    pub no_camera: bool,

    /// Play back recorded landmarks (JSON Lines) instead of following the mouse.
    #[arg(long, value_name = "FILE.jsonl")]
    pub replay: Option<PathBuf>,

    /// Initial stroke color: a palette name or #rgb / #rrggbb.
    #[arg(long, default_value = "purple")]
    pub color: Color,

    /// Pinch distance (normalized units) below which the hand draws.
    #[arg(long, default_value_t = PINCH_THRESHOLD, value_parser = parse_positive)]
    pub pinch_threshold: f32,

    /// Smoothing factor in (0,1]; higher follows the hand more tightly.
    #[arg(long, default_value_t = SMOOTHING, value_parser = parse_unit_factor)]
    pub smoothing: f32,

    /// Minimum movement in canvas pixels before a segment is drawn.
    #[arg(long, default_value_t = MOVE_THRESHOLD, value_parser = parse_non_negative)]
    pub move_threshold: f32,

    /// Do not mirror the canvas horizontally.
    #[arg(long)]
    pub no_mirror: bool,

    /// Refinement service endpoint. Refine is disabled when unset.
    #[arg(long, env = "GESTURE_CANVAS_REFINE_URL")]
    pub refine_url: Option<String>,

    /// Bearer token sent to the refinement service.
    #[arg(long, env = "GESTURE_CANVAS_REFINE_TOKEN", hide_env_values = true)]
    pub refine_token: Option<String>,

    /// Whole-request timeout for refinement, in seconds.
    #[arg(long, default_value_t = DEFAULT_REFINE_TIMEOUT_SECS)]
    pub refine_timeout_secs: u64,

    /// Connect timeout for refinement, in seconds.
    #[arg(long, default_value_t = DEFAULT_REFINE_CONNECT_TIMEOUT_SECS)]
    pub refine_connect_timeout_secs: u64,
}

impl Args {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            gesture: GestureConfig { pinch_threshold: self.pinch_threshold },
            smoothing: self.smoothing,
            move_threshold: self.move_threshold,
            mirror: !self.no_mirror,
            refine_timeout: Duration::from_secs(self.refine_timeout_secs),
            ..SessionConfig::default()
        }
    }

    /// The HTTP refiner, or None when no endpoint is configured.
    pub fn refiner(&self) -> Result<Option<Arc<dyn Refiner>>, RefineError> {
        let Some(url) = self.refine_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let refiner = HttpRefiner::new(
            url.trim_end_matches('/').to_string(),
            self.refine_token.clone(),
            Duration::from_secs(self.refine_timeout_secs),
            Duration::from_secs(self.refine_connect_timeout_secs),
        )?;
        Ok(Some(Arc::new(refiner)))
    }
}

fn parse_f32(raw: &str) -> Result<f32, String> {
    raw.parse::<f32>().map_err(|e| format!("{raw}: {e}"))
}

fn parse_unit_factor(raw: &str) -> Result<f32, String> {
    let v = parse_f32(raw)?;
    if v > 0.0 && v <= 1.0 { Ok(v) } else { Err(format!("{v} is outside (0, 1]")) }
}

fn parse_positive(raw: &str) -> Result<f32, String> {
    let v = parse_f32(raw)?;
    if v > 0.0 && v.is_finite() { Ok(v) } else { Err(format!("{v} must be > 0")) }
}

fn parse_non_negative(raw: &str) -> Result<f32, String> {
    let v = parse_f32(raw)?;
    if v >= 0.0 && v.is_finite() { Ok(v) } else { Err(format!("{v} must be >= 0")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_session_defaults() {
        let args = Args::try_parse_from(["gesture-canvas"]).unwrap();
        let config = args.session_config();
        let defaults = SessionConfig::default();
        assert_eq!(config.gesture, defaults.gesture);
        assert_eq!(config.smoothing, defaults.smoothing);
        assert_eq!(config.move_threshold, defaults.move_threshold);
        assert!(config.mirror);
        assert_eq!(args.color, Color::PURPLE);
        assert!(args.refiner().unwrap().is_none());
    }

    #[test]
    fn flags_flow_into_session_config() {
        let args = Args::try_parse_from([
            "gesture-canvas",
            "--pinch-threshold",
            "0.1",
            "--smoothing",
            "1",
            "--no-mirror",
            "--color",
            "#00ff00",
        ])
        .unwrap();
        let config = args.session_config();
        assert_eq!(config.gesture.pinch_threshold, 0.1);
        assert_eq!(config.smoothing, 1.0);
        assert!(!config.mirror);
        assert_eq!(args.color, Color(0xFF_00_FF_00));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Args::try_parse_from(["gesture-canvas", "--smoothing", "0"]).is_err());
        assert!(Args::try_parse_from(["gesture-canvas", "--smoothing", "1.5"]).is_err());
        assert!(Args::try_parse_from(["gesture-canvas", "--pinch-threshold", "-0.1"]).is_err());
        assert!(Args::try_parse_from(["gesture-canvas", "--color", "mauve-ish"]).is_err());
    }

    #[test]
    fn refine_url_builds_a_refiner() {
        let args = Args::try_parse_from(["gesture-canvas", "--refine-url", "https://refine.example/api/"]).unwrap();
        assert!(args.refiner().unwrap().is_some());
    }
}
