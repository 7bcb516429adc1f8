// Session controller: one hand, one canvas, one history.
//
// Every landmark detection (or "no hand" event) goes through
// `Session::on_detection`, which smooths the thumb position, classifies the
// pinch and runs the Idle/Drawing transition table:
//
// | current | event            | next    | action                                        |
// |---------|------------------|---------|-----------------------------------------------|
// | any     | no hand          | Idle    | commit if ink was laid down; hide the cursor  |
// | Idle    | pinch            | Drawing | start a fresh path                            |
// | Drawing | pinch            | Drawing | render; remember whether ink was laid down    |
// | Drawing | release          | Idle    | commit if ink was laid down                   |
// | Idle    | no pinch         | Idle    | nothing                                       |
//
// Undo/redo restores and refinements complete later. `Session::poll` applies
// whatever has finished (restores in the order they were issued);
// `Session::settle` waits for all of it. While a restore is pending the hand
// only moves the cursor.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::canvas::Surface;
use crate::error::Error;
use crate::geometry::{smooth, to_canvas};
use crate::gesture::{GestureConfig, classify};
use crate::history::{History, MAX_HISTORY_STATES, Snapshot};
use crate::refine::{DEFAULT_REFINE_TIMEOUT_SECS, RefineError, RefinementAdapter, Refiner};
use crate::stroke::{self, MOVE_THRESHOLD, Pen, STROKE_WIDTH};
use crate::types::{Color, GestureState, LandmarkSet, PixelPoint};

pub const CANVAS_WIDTH: usize = 640;
pub const CANVAS_HEIGHT: usize = 480;
pub const SMOOTHING: f32 = 0.4;

/// HUD label when no hand is in view.
pub const NO_HAND_LABEL: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub width: usize,
    pub height: usize,
    pub gesture: GestureConfig,
    /// Exponential smoothing factor in (0,1].
    pub smoothing: f32,
    /// Minimum movement (canvas pixels) before a segment is drawn.
    pub move_threshold: f32,
    pub stroke_width: f32,
    pub history_cap: usize,
    /// Flip x so the canvas behaves like a mirror of the user.
    pub mirror: bool,
    pub refine_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            gesture: GestureConfig::default(),
            smoothing: SMOOTHING,
            move_threshold: MOVE_THRESHOLD,
            stroke_width: STROKE_WIDTH,
            history_cap: MAX_HISTORY_STATES,
            mirror: true,
            refine_timeout: Duration::from_secs(DEFAULT_REFINE_TIMEOUT_SECS),
        }
    }
}

/// Per-detection state, mutated only by the transition table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionState {
    /// Start point of the next segment; None = next Drawing frame begins a fresh path.
    pub previous: Option<PixelPoint>,
    /// Smoothed thumb position; None = next detection cold-starts the filter.
    pub smoothed: Option<PixelPoint>,
    pub gesture: GestureState,
    /// Some ink was laid down since the current Drawing run began.
    pub stroke_started: bool,
}

/// What happened to a finished refinement.
#[derive(Debug)]
pub enum RefineOutcome {
    /// The canvas was replaced and a snapshot committed.
    Applied,
    /// Nothing changed; the user should be told.
    Failed(RefineError),
}

type PendingRestore = oneshot::Receiver<Result<Surface, Error>>;

pub struct Session {
    config: SessionConfig,
    surface: Surface,
    history: History,
    state: SessionState,
    pen: Pen,
    cursor: Option<PixelPoint>,
    restores: VecDeque<PendingRestore>,
    refinement: RefinementAdapter,
    runtime: Handle,
}

impl Session {
    /// Blank canvas; the blank snapshot becomes history entry 0.
    pub fn new(config: SessionConfig, runtime: Handle) -> Result<Self, Error> {
        let surface = Surface::new(config.width, config.height);
        let history = History::new(Snapshot::capture(&surface)?, config.history_cap);
        let pen = Pen::new(Color::default(), config.stroke_width);
        let refinement = RefinementAdapter::new(config.refine_timeout);
        info!(width = config.width, height = config.height, cap = history.cap(), "session ready");
        Ok(Self {
            config,
            surface,
            history,
            state: SessionState::default(),
            pen,
            cursor: None,
            restores: VecDeque::new(),
            refinement,
            runtime,
        })
    }

    /* --- per-detection --- */

    /// Feed one detection. Never fails: a bad frame is logged, the gesture
    /// drops to Idle and the next frame starts clean.
    pub fn on_detection(&mut self, hand: Option<&LandmarkSet>) {
        self.apply_ready_restores();
        let result = match hand {
            Some(hand) => self.step(hand),
            None => {
                self.cursor = None;
                self.end_stroke()
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "detection dropped; back to idle");
            self.cursor = None;
            // end_stroke resets the state before committing, so this cannot loop.
            if let Err(e) = self.end_stroke() {
                warn!(error = %e, "stroke could not be committed");
            }
        }
    }

    fn step(&mut self, hand: &LandmarkSet) -> Result<(), Error> {
        let thumb = hand.thumb_tip();
        if !thumb.is_finite() || !hand.index_tip().is_finite() {
            return Err(Error::Landmarks("non-finite thumb/index coordinates".into()));
        }

        let raw = to_canvas(thumb, self.config.width, self.config.height, self.config.mirror);
        let smoothed = smooth(self.state.smoothed, raw, self.config.smoothing);
        self.state.smoothed = Some(smoothed);
        self.cursor = Some(smoothed);

        // A restore is about to replace the surface; no ink until it lands.
        if !self.restores.is_empty() {
            return Ok(());
        }

        match (self.state.gesture, classify(hand, &self.config.gesture)) {
            (GestureState::Idle, GestureState::Idle) => return Ok(()),
            (GestureState::Drawing, GestureState::Idle) => return self.end_stroke(),
            (GestureState::Idle, GestureState::Drawing) => {
                debug!(x = smoothed.x, y = smoothed.y, "stroke begin");
                self.state.gesture = GestureState::Drawing;
                self.state.previous = None;
                self.state.stroke_started = false;
            }
            (GestureState::Drawing, GestureState::Drawing) => {}
        }

        let step = stroke::render(
            &mut self.surface,
            GestureState::Drawing,
            self.state.previous,
            smoothed,
            &self.pen,
            self.config.move_threshold,
        );
        self.state.previous = step.previous;
        self.state.stroke_started |= step.drew;
        Ok(())
    }

    /// Back to Idle; commit if the run that just ended laid down ink.
    fn end_stroke(&mut self) -> Result<(), Error> {
        let had_ink = self.state.gesture == GestureState::Drawing && self.state.stroke_started;
        self.state = SessionState::default();
        if had_ink {
            debug!("stroke end");
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        let snapshot = Snapshot::capture(&self.surface)?;
        self.history.commit(snapshot);
        Ok(())
    }

    /* --- user operations --- */

    /// Returns false at the oldest entry. The surface updates once the restore lands.
    pub fn undo(&mut self) -> bool {
        match self.history.undo().cloned() {
            Some(snapshot) => {
                self.schedule_restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Returns false at the newest entry. The surface updates once the restore lands.
    pub fn redo(&mut self) -> bool {
        match self.history.redo().cloned() {
            Some(snapshot) => {
                self.schedule_restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Wipe the canvas and commit the blank state.
    pub fn clear(&mut self) -> Result<(), Error> {
        // A full wipe supersedes any restore still decoding.
        self.restores.clear();
        self.surface.clear();
        self.commit()?;
        info!("canvas cleared");
        Ok(())
    }

    /// Takes effect on the next segment, including mid-stroke.
    pub fn set_color(&mut self, color: Color) {
        debug!(%color, "color selected");
        self.pen.color = color;
    }

    /// Start refining the canvas; false if a refinement is already running.
    /// With restores still decoding, the history entry they lead to is sent
    /// instead of the surface on screen.
    pub fn refine(&mut self, refiner: Arc<dyn Refiner>) -> bool {
        self.apply_ready_restores();
        if self.restores.is_empty() {
            return self.refinement.start(&self.runtime, refiner, &self.surface);
        }
        let (width, height) = (self.config.width, self.config.height);
        self.refinement.start_png(&self.runtime, refiner, self.history.current().bytes(), width, height)
    }

    /* --- completion --- */

    /// Apply finished restores and a finished refinement without waiting.
    pub fn poll(&mut self) -> Option<RefineOutcome> {
        self.apply_ready_restores();
        let result = self.refinement.poll()?;
        Some(self.finish_refine(result))
    }

    /// Wait for every pending restore and the in-flight refinement, applying them in order.
    pub async fn settle(&mut self) -> Option<RefineOutcome> {
        while let Some(rx) = self.restores.pop_front() {
            match rx.await {
                Ok(result) => self.apply_restore(result),
                Err(_) => warn!("restore task dropped"),
            }
        }
        let result = self.refinement.wait().await?;
        Some(self.finish_refine(result))
    }

    fn schedule_restore(&mut self, snapshot: Snapshot) {
        // Ink of an unfinished stroke is overwritten by the restore, so it never commits.
        self.state = SessionState { smoothed: self.state.smoothed, ..SessionState::default() };
        let (tx, rx) = oneshot::channel();
        let (width, height) = (self.config.width, self.config.height);
        self.runtime.spawn_blocking(move || {
            let _ = tx.send(snapshot.restore(width, height));
        });
        self.restores.push_back(rx);
    }

    fn apply_ready_restores(&mut self) {
        while let Some(rx) = self.restores.front_mut() {
            match rx.try_recv() {
                Ok(result) => {
                    self.restores.pop_front();
                    self.apply_restore(result);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    self.restores.pop_front();
                    warn!("restore task dropped");
                }
            }
        }
    }

    fn apply_restore(&mut self, result: Result<Surface, Error>) {
        match result {
            Ok(surface) => self.surface = surface,
            Err(e) => warn!(error = %e, "snapshot restore failed; canvas left as is"),
        }
    }

    fn finish_refine(&mut self, result: Result<Surface, RefineError>) -> RefineOutcome {
        match result {
            Ok(surface) => {
                // The refined image replaces everything, so earlier restores are moot.
                self.restores.clear();
                self.surface = surface;
                if let Err(e) = self.commit() {
                    warn!(error = %e, "refined canvas applied but not committed");
                }
                info!("refined canvas applied");
                RefineOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, "refine failed; canvas untouched");
                RefineOutcome::Failed(e)
            }
        }
    }

    /* --- accessors --- */

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cursor indicator position in canvas pixels; None while no hand is detected.
    pub fn cursor(&self) -> Option<PixelPoint> {
        self.cursor
    }

    pub fn gesture_label(&self) -> &'static str {
        if self.cursor.is_some() { self.state.gesture.label() } else { NO_HAND_LABEL }
    }

    pub fn color(&self) -> Color {
        self.pen.color
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_refining(&self) -> bool {
        self.refinement.is_refining()
    }

    pub fn pending_restores(&self) -> usize {
        self.restores.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLANK, decode_data_uri, encode_data_uri};
    use crate::refine::{RefineRequest, RefineResponse};
    use crate::types::{INDEX_TIP, LANDMARK_COUNT, NormalizedPoint, THUMB_TIP};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /* --- helpers --- */

    /// A hand whose thumb tip lands on canvas pixel (px, py) with the default mirrored mapping.
    fn hand_at(px: f32, py: f32, pinched: bool) -> LandmarkSet {
        let thumb = NormalizedPoint::new(1.0 - px / CANVAS_WIDTH as f32, py / CANVAS_HEIGHT as f32);
        let index = if pinched {
            NormalizedPoint::new(thumb.x + 0.01, thumb.y)
        } else {
            NormalizedPoint::new(thumb.x, thumb.y - 0.2)
        };
        let mut points = [NormalizedPoint::new(0.5, 0.9); LANDMARK_COUNT];
        points[THUMB_TIP] = thumb;
        points[INDEX_TIP] = index;
        LandmarkSet::new(points)
    }

    fn session() -> Session {
        Session::new(SessionConfig::default(), Handle::current()).unwrap()
    }

    fn inked(s: &Session, x: usize, y: usize) -> bool {
        s.surface().pixel(x, y).is_some_and(|p| p != BLANK)
    }

    /// Pinch at each x along row y, then release at the last x.
    fn stroke(s: &mut Session, xs: &[f32], y: f32) {
        for &x in xs {
            s.on_detection(Some(&hand_at(x, y, true)));
        }
        let last = xs[xs.len() - 1];
        s.on_detection(Some(&hand_at(last, y, false)));
    }

    struct MockRefiner {
        output: Option<String>,
        calls: AtomicUsize,
        sent: Mutex<Option<String>>,
    }

    impl MockRefiner {
        fn new(output: Option<String>) -> Arc<Self> {
            Arc::new(Self { output, calls: AtomicUsize::new(0), sent: Mutex::new(None) })
        }

        fn sent_surface(&self) -> Surface {
            let uri = self.sent.lock().unwrap().clone().unwrap();
            Surface::decode(&decode_data_uri(&uri).unwrap(), CANVAS_WIDTH, CANVAS_HEIGHT).unwrap()
        }
    }

    fn blue_uri() -> String {
        let blue = Surface::from_pixels(320, 240, vec![0xFF_00_00_FF; 320 * 240]).unwrap();
        encode_data_uri("image/png", &blue.encode_png().unwrap())
    }

    #[async_trait::async_trait]
    impl Refiner for MockRefiner {
        async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, RefineError> {
            assert!(request.image.starts_with("data:image/png;base64,"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.sent.lock().unwrap() = Some(request.image.clone());
            Ok(RefineResponse { output: self.output.clone() })
        }
    }

    /* --- strokes and commits --- */

    #[tokio::test]
    async fn pinch_drag_release_commits_one_stroke() {
        let mut s = session();
        stroke(&mut s, &[100.0, 125.0, 150.0, 175.0, 200.0], 100.0);

        assert_eq!(s.history().len(), 2);
        assert!(s.can_undo());
        assert!(!s.can_redo());
        assert_eq!(s.state().gesture, GestureState::Idle);

        // Smoothing lags the hand, so the ink runs from 100 to roughly 167.
        for x in (100..=165).step_by(5) {
            assert!(inked(&s, x, 100), "no ink at x={x}");
        }
        assert!(!inked(&s, 190, 100));
        assert!(!inked(&s, 130, 110));
    }

    #[tokio::test]
    async fn separate_pinches_make_disconnected_strokes() {
        let mut s = session();
        stroke(&mut s, &[100.0, 125.0, 150.0, 175.0, 200.0], 100.0);
        stroke(&mut s, &[300.0, 325.0, 350.0, 375.0, 400.0], 300.0);

        assert_eq!(s.history().len(), 3);
        assert!(inked(&s, 120, 100));
        assert!(inked(&s, 330, 300));
        // Nothing bridges the end of the first stroke to the start of the second.
        assert!(!inked(&s, 235, 200));
        assert!(!inked(&s, 200, 150));
    }

    #[tokio::test]
    async fn pinch_without_movement_commits_nothing() {
        let mut s = session();
        stroke(&mut s, &[200.0, 200.0, 200.0], 200.0);
        assert_eq!(s.history().len(), 1);
        assert!(s.surface().is_blank());
    }

    #[tokio::test]
    async fn jitter_keeps_the_stroke_alive() {
        let mut s = session();
        s.on_detection(Some(&hand_at(100.0, 100.0, true)));
        s.on_detection(Some(&hand_at(101.0, 100.0, true)));
        s.on_detection(Some(&hand_at(100.5, 100.2, true)));

        assert!(s.surface().is_blank());
        assert_eq!(s.state().gesture, GestureState::Drawing);
        assert!(!s.state().stroke_started);
        let anchor = s.state().previous.unwrap();
        assert!((anchor.x - 100.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn losing_the_hand_ends_and_commits_the_stroke() {
        let mut s = session();
        for x in [100.0, 140.0, 180.0] {
            s.on_detection(Some(&hand_at(x, 200.0, true)));
        }
        assert_eq!(s.gesture_label(), GestureState::Drawing.label());
        s.on_detection(None);

        assert_eq!(s.history().len(), 2);
        assert_eq!(s.cursor(), None);
        assert_eq!(s.gesture_label(), NO_HAND_LABEL);
        assert_eq!(*s.state(), SessionState::default());
    }

    #[tokio::test]
    async fn cursor_follows_the_hand_while_idle() {
        let mut s = session();
        s.on_detection(Some(&hand_at(320.0, 240.0, false)));
        let c = s.cursor().unwrap();
        assert!((c.x - 320.0).abs() < 1e-3 && (c.y - 240.0).abs() < 1e-3);
        assert_eq!(s.gesture_label(), GestureState::Idle.label());
        assert!(s.surface().is_blank());
    }

    #[tokio::test]
    async fn bad_frame_is_contained() {
        let mut s = session();
        s.on_detection(Some(&hand_at(100.0, 100.0, true)));
        s.on_detection(Some(&hand_at(130.0, 100.0, true)));

        let mut points = *hand_at(0.0, 0.0, true).points();
        points[THUMB_TIP] = NormalizedPoint::new(f32::NAN, 0.5);
        s.on_detection(Some(&LandmarkSet::new(points)));
        assert_eq!(s.state().gesture, GestureState::Idle);
        assert_eq!(s.cursor(), None);

        // The next frame proceeds normally.
        s.on_detection(Some(&hand_at(300.0, 300.0, false)));
        assert!(s.cursor().is_some());
    }

    #[tokio::test]
    async fn color_change_applies_mid_stroke() {
        let mut s = session();
        s.set_color(Color(0xFF_FF_00_00));
        s.on_detection(Some(&hand_at(100.0, 100.0, true)));
        s.on_detection(Some(&hand_at(160.0, 100.0, true))); // smoothed to 124
        s.set_color(Color(0xFF_00_00_FF));
        s.on_detection(Some(&hand_at(300.0, 100.0, true))); // smoothed to ~194
        assert_eq!(s.surface().pixel(110, 100), Some(0xFF_FF_00_00));
        assert_eq!(s.surface().pixel(170, 100), Some(0xFF_00_00_FF));
        assert_eq!(s.color(), Color(0xFF_00_00_FF));
    }

    /* --- undo / redo / clear --- */

    #[tokio::test]
    async fn undo_and_redo_restore_after_settling() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0, 250.0], 100.0);
        let drawn = s.surface().clone();

        assert!(s.undo());
        assert_eq!(s.history().index(), 0);
        s.settle().await;
        assert!(s.surface().is_blank());
        assert!(!s.can_undo());

        assert!(s.redo());
        s.settle().await;
        assert_eq!(s.surface(), &drawn);
        assert_eq!(s.pending_restores(), 0);
    }

    #[tokio::test]
    async fn boundary_undo_redo_change_nothing() {
        let mut s = session();
        assert!(!s.undo());
        assert_eq!(s.pending_restores(), 0);

        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        let before = s.surface().clone();
        assert!(!s.redo());
        s.settle().await;
        assert_eq!(s.surface(), &before);
        assert_eq!(s.history().index(), 1);
    }

    #[tokio::test]
    async fn restores_apply_in_issue_order() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        stroke(&mut s, &[100.0, 150.0, 200.0], 300.0);
        let latest = s.surface().clone();

        s.undo();
        s.undo();
        s.redo();
        s.redo();
        assert_eq!(s.pending_restores(), 4);
        s.settle().await;
        assert_eq!(s.surface(), &latest);
    }

    #[tokio::test]
    async fn commit_after_undo_drops_redo_branch() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        stroke(&mut s, &[100.0, 150.0, 200.0], 200.0);
        s.undo();
        s.settle().await;
        assert!(s.can_redo());

        stroke(&mut s, &[100.0, 150.0, 200.0], 300.0);
        assert!(!s.can_redo());
        assert_eq!(s.history().len(), 3);
        assert!(!inked(&s, 150, 200));
    }

    #[tokio::test]
    async fn clear_commits_a_blank_canvas() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        s.clear().unwrap();
        assert!(s.surface().is_blank());
        assert_eq!(s.history().len(), 3);

        s.undo();
        s.settle().await;
        assert!(inked(&s, 120, 100));
    }

    #[tokio::test]
    async fn pinching_while_a_restore_decodes_draws_nothing() {
        let mut s = session();
        // A restore that never lands.
        let (_tx, rx) = oneshot::channel();
        s.restores.push_back(rx);

        stroke(&mut s, &[100.0, 150.0, 200.0, 250.0], 100.0);
        assert!(s.surface().is_blank());
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.state().gesture, GestureState::Idle);
        assert!(s.cursor().is_some());
    }

    #[tokio::test]
    async fn stroke_right_after_undo_keeps_canvas_and_history_in_step() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0, 250.0], 100.0);
        assert!(s.undo());
        // Whether or not the restore has landed yet, this stroke must not revive the first one.
        stroke(&mut s, &[100.0, 150.0, 200.0, 250.0], 300.0);
        s.settle().await;

        let current = s.history().current().restore(CANVAS_WIDTH, CANVAS_HEIGHT).unwrap();
        assert_eq!(s.surface(), &current);
        assert!(!inked(&s, 150, 100));
        assert!(s.history().len() <= 2);
    }

    #[tokio::test]
    async fn undo_mid_stroke_drops_the_unfinished_ink() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        s.on_detection(Some(&hand_at(100.0, 300.0, true)));
        s.on_detection(Some(&hand_at(200.0, 300.0, true)));
        assert!(s.state().stroke_started);

        assert!(s.undo());
        assert_eq!(s.state().gesture, GestureState::Idle);
        s.settle().await;
        s.on_detection(None);
        assert!(s.surface().is_blank());
        assert_eq!(s.history().len(), 2);
    }

    /* --- refinement --- */

    #[tokio::test]
    async fn refine_failure_leaves_everything_intact() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        let before = s.surface().clone();
        let len = s.history().len();

        let mock = MockRefiner::new(None);
        assert!(s.refine(mock.clone()));
        assert!(s.is_refining());

        let outcome = s.settle().await;
        assert!(matches!(outcome, Some(RefineOutcome::Failed(RefineError::MissingOutput))));
        assert_eq!(s.surface(), &before);
        assert_eq!(s.history().len(), len);
        assert!(!s.is_refining());

        // The guard is clear, so a retry really starts.
        assert!(s.refine(mock.clone()));
        s.settle().await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refine_success_replaces_and_commits() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        let drawn = s.surface().clone();

        assert!(s.refine(MockRefiner::new(Some(blue_uri()))));

        assert!(matches!(s.settle().await, Some(RefineOutcome::Applied)));
        assert_eq!(s.surface().width(), CANVAS_WIDTH);
        assert_eq!(s.surface().pixel(10, 10), Some(0xFF_00_00_FF));
        assert_eq!(s.history().len(), 3);

        // Refinement is undoable like any stroke.
        s.undo();
        s.settle().await;
        assert_eq!(s.surface(), &drawn);
    }

    #[tokio::test]
    async fn undo_during_refinement_truncates_the_redo_branch() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        let first = s.surface().clone();
        stroke(&mut s, &[100.0, 150.0, 200.0], 300.0);

        assert!(s.refine(MockRefiner::new(Some(blue_uri()))));
        assert!(s.undo());
        assert_eq!(s.history().index(), 1);

        assert!(matches!(s.settle().await, Some(RefineOutcome::Applied)));
        assert_eq!(s.history().len(), 3);
        assert_eq!(s.history().index(), 2);
        assert!(!s.can_redo());
        assert_eq!(s.surface().pixel(10, 10), Some(0xFF_00_00_FF));

        // The refined entry sits directly after the state the undo went back to.
        s.undo();
        s.settle().await;
        assert_eq!(s.surface(), &first);
    }

    #[tokio::test]
    async fn refine_right_after_undo_sends_the_undone_canvas() {
        let mut s = session();
        stroke(&mut s, &[100.0, 150.0, 200.0], 100.0);
        let first = s.surface().clone();
        stroke(&mut s, &[100.0, 150.0, 200.0], 300.0);

        assert!(s.undo());
        let mock = MockRefiner::new(None);
        assert!(s.refine(mock.clone()));
        s.settle().await;
        assert_eq!(mock.sent_surface(), first);
    }

    #[tokio::test]
    async fn second_refine_while_in_flight_is_ignored() {
        let mut s = session();
        let mock = MockRefiner::new(None);
        assert!(s.refine(mock.clone()));
        assert!(!s.refine(mock.clone()));
        s.settle().await;
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_eventually_reports_refinement() {
        let mut s = session();
        s.refine(MockRefiner::new(None));
        let outcome = loop {
            if let Some(outcome) = s.poll() {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert!(matches!(outcome, RefineOutcome::Failed(RefineError::MissingOutput)));
        assert!(!s.is_refining());
    }
}
