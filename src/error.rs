// Crate-wide error type. Every variant states *where* things went wrong.
// Refinement failures live in `refine::RefineError`; they are recoverable and
// never travel through this type.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Creating the window failed.
    #[error("window init error: {0}")]
    WindowInit(String),

    /// Updating the window buffer failed.
    #[error("window update error: {0}")]
    WindowUpdate(String),

    /// Opening/starting the camera failed.
    #[error("camera init error: {0}")]
    CameraInit(String),

    /// Grabbing/decoding a frame failed.
    #[error("camera frame error: {0}")]
    CameraFrame(String),

    /// A landmark detection could not be used (bad count, non-finite coords, bad recording line).
    #[error("landmark error: {0}")]
    Landmarks(String),

    /// Encoding or decoding a surface snapshot failed.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// A pixel buffer did not match the dimensions it claimed.
    #[error("surface error: {0}")]
    Surface(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The async runtime could not be started.
    #[error("runtime error: {0}")]
    Runtime(String),
}
