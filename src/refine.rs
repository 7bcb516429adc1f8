// "Refine with AI": ship the canvas to an external image service and bring
// the returned bitmap back.
// The service sits behind the `Refiner` trait; `HttpRefiner` talks JSON over
// HTTP. `RefinementAdapter` allows one call at a time and hands the result
// back through a oneshot channel that the session polls from its own thread.
// Visual: the HUD shows "REFINING..." until the new bitmap replaces the canvas.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::canvas::{Surface, decode_data_uri, encode_data_uri};

pub const DEFAULT_REFINE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REFINE_CONNECT_TIMEOUT_SECS: u64 = 10;

/* --- errors --- */

/// Why a refinement did not replace the canvas. All of these are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum RefineError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response.
    #[error("refine request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("refine service returned status {status}")]
    Response { status: u16, body: String },

    /// The response body was not the expected JSON.
    #[error("refine response parse failed: {0}")]
    Parse(String),

    /// The response had no usable `output` field.
    #[error("refine response has no output image")]
    MissingOutput,

    /// `output` was neither a data: URI nor something this refiner can fetch.
    #[error("unsupported refine output: {0}")]
    UnsupportedOutput(String),

    /// The canvas could not be serialized for upload.
    #[error("canvas encode failed: {0}")]
    Encode(String),

    /// The returned bitmap could not be decoded.
    #[error("refined image decode failed: {0}")]
    Decode(String),

    #[error("refine timed out after {0:?}")]
    Timeout(Duration),
}

/* --- wire format --- */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefineRequest {
    /// `data:image/png;base64,...`
    pub image: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefineResponse {
    /// URL or data: URI of the replacement bitmap.
    #[serde(default)]
    pub output: Option<String>,
}

/* --- capability --- */

/// External image refinement service.
#[async_trait::async_trait]
pub trait Refiner: Send + Sync {
    async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, RefineError>;

    /// Fetch an `output` that is a URL rather than a data: URI.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RefineError> {
        Err(RefineError::UnsupportedOutput(url.to_string()))
    }
}

/// JSON-over-HTTP refiner: `POST {endpoint}` with `{"image": ...}`, expects `{"output": ...}`.
pub struct HttpRefiner {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpRefiner {
    pub fn new(endpoint: String, api_key: Option<String>, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, RefineError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RefineError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, endpoint, api_key })
    }
}

#[async_trait::async_trait]
impl Refiner for HttpRefiner {
    async fn refine(&self, request: &RefineRequest) -> Result<RefineResponse, RefineError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(|e| RefineError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| RefineError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(RefineError::Response { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| RefineError::Parse(e.to_string()))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RefineError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RefineError::UnsupportedOutput(url.to_string()));
        }
        let response = self.http.get(url).send().await.map_err(|e| RefineError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(RefineError::Response { status, body });
        }
        let bytes = response.bytes().await.map_err(|e| RefineError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/* --- adapter --- */

type Pending = oneshot::Receiver<Result<Surface, RefineError>>;

/// Reentrancy-guarded refinement runner.
pub struct RefinementAdapter {
    in_flight: Option<Pending>,
    timeout: Duration,
}

impl RefinementAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { in_flight: None, timeout }
    }

    pub fn is_refining(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Kick off a refinement of `surface`. Returns false (and does nothing) if
    /// one is already running. An encode failure is reported like any other
    /// refinement failure once polled.
    pub fn start(&mut self, runtime: &Handle, refiner: Arc<dyn Refiner>, surface: &Surface) -> bool {
        if self.in_flight.is_some() {
            debug!("refine already in flight; ignoring");
            return false;
        }
        match surface.encode_png() {
            Ok(png) => self.start_png(runtime, refiner, &png, surface.width(), surface.height()),
            Err(e) => {
                let (tx, rx) = oneshot::channel();
                let _ = tx.send(Err(RefineError::Encode(e.to_string())));
                self.in_flight = Some(rx);
                true
            }
        }
    }

    /// Same as [`start`](Self::start) for a canvas already captured as PNG;
    /// the result is scaled to `width`x`height`.
    pub fn start_png(&mut self, runtime: &Handle, refiner: Arc<dyn Refiner>, png: &[u8], width: usize, height: usize) -> bool {
        if self.in_flight.is_some() {
            debug!("refine already in flight; ignoring");
            return false;
        }
        let (tx, rx) = oneshot::channel();
        self.in_flight = Some(rx);

        let image = encode_data_uri("image/png", png);
        let timeout = self.timeout;
        info!(bytes = image.len(), "refine started");
        runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, fetch_refined(refiner.as_ref(), image)).await {
                Ok(result) => result,
                Err(_) => Err(RefineError::Timeout(timeout)),
            };
            let result = match result {
                Ok(bytes) => tokio::task::spawn_blocking(move || {
                    Surface::decode(&bytes, width, height).map_err(|e| RefineError::Decode(e.to_string()))
                })
                .await
                .unwrap_or_else(|e| Err(RefineError::Decode(e.to_string()))),
                Err(e) => Err(e),
            };
            // The session may be gone; nothing to do then.
            let _ = tx.send(result);
        });
        true
    }

    /// Non-blocking: the finished result, if any. Clears the in-flight guard when it returns Some.
    pub fn poll(&mut self) -> Option<Result<Surface, RefineError>> {
        let rx = self.in_flight.as_mut()?;
        match rx.try_recv() {
            Ok(result) => {
                self.in_flight = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.in_flight = None;
                warn!("refine task ended without a result");
                Some(Err(RefineError::Request("refine task dropped".into())))
            }
        }
    }

    /// Wait for the in-flight refinement, if any.
    pub async fn wait(&mut self) -> Option<Result<Surface, RefineError>> {
        let rx = self.in_flight.take()?;
        Some(rx.await.unwrap_or_else(|_| Err(RefineError::Request("refine task dropped".into()))))
    }
}

/// Request, validate `output`, and resolve it to raw bitmap bytes.
async fn fetch_refined(refiner: &dyn Refiner, image: String) -> Result<Vec<u8>, RefineError> {
    let response = refiner.refine(&RefineRequest { image }).await?;
    let output = response
        .output
        .filter(|o| !o.trim().is_empty())
        .ok_or(RefineError::MissingOutput)?;
    if output.starts_with("data:") {
        return decode_data_uri(&output).ok_or_else(|| RefineError::Decode("malformed data URI".into()));
    }
    refiner.fetch(&output).await
}
