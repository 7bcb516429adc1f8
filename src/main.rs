// What you SEE:
// • Left: the mirrored camera preview with the detected hand skeleton.
// • Right: the canvas. Pinch thumb and index to draw; open the hand to stop.
//   Without a hand model the mouse stands in: hold the left button to pinch.
// • Z undo, Y redo, C clear, R refine (when configured), 1-8 or click a swatch
//   to change color. ESC quits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use gesture_canvas::camera::{BlankFrames, CameraCapture, FrameProducer};
use gesture_canvas::config::Args;
use gesture_canvas::draw::{
    self, CANVAS_X, Drawer, HUD_TEXT, HUD_WARN, PANEL_HEIGHT, PANEL_WIDTH, PAPER, WINDOW_HEIGHT, WINDOW_WIDTH,
    draw_text_5x7,
};
use gesture_canvas::error::Error;
use gesture_canvas::gamma::GammaLut;
use gesture_canvas::geometry::to_display;
use gesture_canvas::refine::Refiner;
use gesture_canvas::session::{RefineOutcome, Session};
use gesture_canvas::source::{LandmarkSource, PointerHand, ReplaySource};
use gesture_canvas::types::{FrameBuffer, GestureState, NormalizedPoint, PALETTE};
use minifb::Key;
use tracing::{debug, info, warn};

const NOTICE_TTL: Duration = Duration::from_secs(4);

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| Error::Runtime(e.to_string()))?;

    let config = args.session_config();
    let mirror = config.mirror;
    let mut session = Session::new(config, runtime.handle().clone())?;
    session.set_color(args.color);

    let refiner: Option<Arc<dyn Refiner>> = match args.refiner() {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "refinement disabled");
            None
        }
    };

    /* --- Frames: camera, or blank frames when there is none --- */
    let mut producer: Box<dyn FrameProducer> = if args.no_camera {
        Box::new(BlankFrames::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32))
    } else {
        match CameraCapture::new(args.camera, PANEL_WIDTH as u32, PANEL_HEIGHT as u32) {
            Ok(cam) => Box::new(cam),
            Err(e) => {
                warn!(error = %e, "no camera; continuing with a blank preview");
                Box::new(BlankFrames::new(PANEL_WIDTH as u32, PANEL_HEIGHT as u32))
            }
        }
    };

    /* --- Hands: a recording, then the mouse as a stand-in --- */
    let mut replay = args.replay.as_deref().map(ReplaySource::open).transpose()?;
    let mut pointer = PointerHand::new(mirror);

    let mut drawer = Drawer::new("Gesture Canvas", WINDOW_WIDTH, WINDOW_HEIGHT)?;
    let mut screen = FrameBuffer::filled(WINDOW_WIDTH, WINDOW_HEIGHT, 0);
    let lut = GammaLut::new();
    let blank = FrameBuffer::filled(PANEL_WIDTH, PANEL_HEIGHT, 0);

    let mut notice: Option<(String, Instant)> = None;
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        /* 1) Frame + detection. Failures here cost one frame, never the app. */
        let frame = match producer.next_frame() {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(error = %e, "frame skipped");
                None
            }
        };
        let frame_ref = frame.as_ref().unwrap_or(&blank);

        // Once a recording runs out, the mouse takes over.
        let detected = match replay.as_mut().filter(|r| !r.finished()) {
            Some(r) => r.detect(frame_ref),
            None => {
                pointer.set_pointer(canvas_pointer(drawer.mouse_pos()), drawer.left_mouse_down());
                pointer.detect(frame_ref)
            }
        };
        let hand = match detected {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "detection skipped");
                None
            }
        };
        session.on_detection(hand.as_ref());

        /* 2) Keys */
        if drawer.pressed_once(Key::Z) && !session.undo() {
            debug!("nothing to undo");
        }
        if drawer.pressed_once(Key::Y) && !session.redo() {
            debug!("nothing to redo");
        }
        if drawer.pressed_once(Key::C) {
            if let Err(e) = session.clear() {
                warn!(error = %e, "clear failed");
            }
        }
        if drawer.pressed_once(Key::R) {
            match &refiner {
                Some(r) => {
                    if !session.refine(Arc::clone(r)) {
                        notice = Some(("Refine already running".into(), now));
                    }
                }
                None => notice = Some(("Refine not configured".into(), now)),
            }
        }
        let picked = drawer.palette_key().or_else(|| {
            drawer
                .left_mouse_down()
                .then(|| drawer.mouse_pos())
                .flatten()
                .and_then(|(x, y)| draw::palette_hit(x, y))
        });
        if let Some((name, color)) = picked.and_then(|i| PALETTE.get(i)) {
            debug!(color = *name, "color picked");
            session.set_color(*color);
        }

        /* 3) Finished background work */
        if let Some(RefineOutcome::Failed(e)) = session.poll() {
            notice = Some((format!("Refine failed: {e}"), now));
        }
        if notice.as_ref().is_some_and(|(_, at)| now.duration_since(*at) > NOTICE_TTL) {
            notice = None;
        }

        /* 4) Compose: preview left, paper + ink right */
        draw::blit_mirrored(&mut screen, frame_ref, 0, PANEL_WIDTH, PANEL_HEIGHT, mirror);
        if let Some(h) = &hand {
            draw::draw_skeleton(&mut screen, h, 0, PANEL_WIDTH, PANEL_HEIGHT, mirror);
        }
        fill_panel(&mut screen, CANVAS_X, PAPER);
        session.surface().composite_onto(&mut screen, CANVAS_X, &lut);

        if let Some(c) = session.cursor() {
            let logical = (session.config().width, session.config().height);
            let p = to_display(c, logical, (PANEL_WIDTH, PANEL_HEIGHT));
            let drawing = session.state().gesture == GestureState::Drawing;
            draw::draw_cursor(&mut screen, CANVAS_X as i32 + p.x.round() as i32, p.y.round() as i32, drawing, session.color());
        }
        draw::draw_palette(&mut screen, session.color());

        /* 5) HUD */
        draw_text_5x7(&mut screen, 8, 8, &format!("MODE: {}", session.gesture_label()), HUD_TEXT);
        draw_text_5x7(&mut screen, 8, 20, &hud_fps_text, HUD_TEXT);

        let refine_tag = if session.is_refining() { "REFINING..." } else { "R REFINE" };
        let keys = format!(
            "Z UNDO{} | Y REDO{} | C CLEAR | {}",
            if session.can_undo() { "" } else { " -" },
            if session.can_redo() { "" } else { " -" },
            refine_tag
        );
        draw_text_5x7(&mut screen, CANVAS_X as i32 + 8, 8, &keys, HUD_TEXT);
        if let Some((msg, _)) = &notice {
            draw_text_5x7(&mut screen, CANVAS_X as i32 + 8, 20, msg, HUD_WARN);
        }

        drawer.present(&screen)?;

        /* 6) FPS */
        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            debug!(fps, "frame rate");
            hud_fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    producer.stop();
    if let Some(r) = replay.as_mut() {
        r.close();
    }
    pointer.close();
    runtime.shutdown_timeout(Duration::from_millis(500));
    info!("bye");
    Ok(())
}

/// Mouse position over the drawing panel, in canvas-normalized coordinates.
fn canvas_pointer(mouse: Option<(usize, usize)>) -> Option<NormalizedPoint> {
    let (x, y) = mouse?;
    if x < CANVAS_X || x >= CANVAS_X + PANEL_WIDTH || y >= PANEL_HEIGHT || draw::palette_hit(x, y).is_some() {
        return None;
    }
    Some(NormalizedPoint::new(
        (x - CANVAS_X) as f32 / PANEL_WIDTH as f32,
        y as f32 / PANEL_HEIGHT as f32,
    ))
}

fn fill_panel(screen: &mut FrameBuffer, x_offset: usize, color: u32) {
    for row in screen.pixels.chunks_mut(screen.width) {
        for px in row.iter_mut().skip(x_offset).take(PANEL_WIDTH) {
            *px = color;
        }
    }
}
