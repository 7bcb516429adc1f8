// Frame producers: the camera (nokhwa) and a stand-in that emits blank frames.
// Visual expectation: `next_frame()` hands back 0x00RRGGBB pixels, ready to be
// mirrored into the preview panel and fed to the landmark source.

use crate::error::Error;
use crate::types::FrameBuffer;

use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
};
use tracing::{info, warn};

/// Something that yields video frames until stopped.
pub trait FrameProducer {
    /// Next frame; may block until one is ready.
    fn next_frame(&mut self) -> Result<FrameBuffer, Error>;

    /// Actual (width, height) being delivered.
    fn resolution(&self) -> (u32, u32);

    /// Stop delivering frames and release the device.
    fn stop(&mut self) {}
}

// A small wrapper around nokhwa::Camera so the main loop stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution and start streaming.
    pub fn new(index: u32, width: u32, height: u32) -> Result<Self, Error> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            30,                // target FPS
        );
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req).map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;
        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The stream might choose a slightly different resolution.
        let actual = cam.resolution();
        info!(index, width = actual.width(), height = actual.height(), "camera streaming");

        Ok(Self { cam, width: actual.width(), height: actual.height() })
    }
}

impl FrameProducer for CameraCapture {
    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let (w, h) = rgb_img.dimensions();
        let pixels = rgb_img
            .pixels()
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2]))
            .collect();

        Ok(FrameBuffer { width: w as usize, height: h as usize, pixels })
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stop(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            warn!("camera stop failed: {e}");
        } else {
            info!("camera stopped");
        }
    }
}

/// Constant dark frames, for running without a camera.
pub struct BlankFrames {
    frame: FrameBuffer,
}

impl BlankFrames {
    pub fn new(width: u32, height: u32) -> Self {
        Self { frame: FrameBuffer::filled(width as usize, height as usize, 0x00_18_18_1C) }
    }
}

impl FrameProducer for BlankFrames {
    fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        Ok(self.frame.clone())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.frame.width as u32, self.frame.height as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frames_match_resolution() {
        let mut frames = BlankFrames::new(640, 480);
        let f = frames.next_frame().unwrap();
        assert_eq!((f.width, f.height), (640, 480));
        assert_eq!(frames.resolution(), (640, 480));
        assert_eq!(f.pixels.len(), 640 * 480);
    }
}
