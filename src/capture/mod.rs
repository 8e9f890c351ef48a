//! Camera Capture Layer
//!
//! Owns the camera stream for exactly as long as the workflow needs it.
//! A stream is acquired with a facing preference, falls back to any camera
//! when the preferred one is refused, and is always released through
//! [`CameraSession`], whichever way the session ends.

pub mod encoder;
pub mod frame;
pub mod still;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::shared::EncodedImage;
use encoder::ImageEncoder;
use frame::CapturedFrame;

pub use still::StillImageCamera;

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user
    #[default]
    Environment,
    /// Front camera, pointing at the user
    User,
}

/// Constraints for a stream request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamConstraints {
    /// Required facing, or `None` for any camera
    pub facing: Option<FacingMode>,
}

impl StreamConstraints {
    /// Request a camera facing a specific way
    pub fn facing(mode: FacingMode) -> Self {
        Self { facing: Some(mode) }
    }

    /// Request any available camera
    pub fn any() -> Self {
        Self { facing: None }
    }
}

/// Errors raised while acquiring or reading a camera
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No camera satisfies the constraints
    #[error("No camera matches the requested constraints: {0}")]
    NoMatchingDevice(String),

    /// The device failed while opening or streaming
    #[error("Camera device error: {0}")]
    Device(String),

    /// Both the constrained and the unconstrained request failed
    #[error("Could not access camera. Please check your permissions and try again.")]
    CameraUnavailable {
        constrained: Box<CaptureError>,
        fallback: Box<CaptureError>,
    },

    /// The frame buffer does not match its declared size
    #[error("Frame buffer of {len} bytes does not match {width}x{height} RGBA")]
    InvalidFrame { width: u32, height: u32, len: usize },

    /// The session was already released
    #[error("Camera stream has already been released")]
    Released,

    /// JPEG encoding failed
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// A live media stream from a camera
pub trait MediaStream: Send {
    /// Native resolution as (width, height)
    fn resolution(&self) -> (u32, u32);

    /// Grab the current video frame at native resolution
    fn read_frame(&mut self) -> Result<CapturedFrame, CaptureError>;

    /// Stop every track of the stream, releasing the hardware
    fn stop_tracks(&mut self);
}

/// Something that can hand out camera streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Open a stream satisfying `constraints`; suspends during negotiation
    async fn open(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError>;
}

/// Scoped ownership of an acquired camera stream
///
/// The stream is stopped exactly once: by [`CameraSession::release`], or on
/// drop if the session is abandoned.
pub struct CameraSession {
    stream: Option<Box<dyn MediaStream>>,
    constraints: StreamConstraints,
}

impl CameraSession {
    fn new(stream: Box<dyn MediaStream>, constraints: StreamConstraints) -> Self {
        Self {
            stream: Some(stream),
            constraints,
        }
    }

    /// Constraints the stream was granted under
    pub fn constraints(&self) -> StreamConstraints {
        self.constraints
    }

    /// Native resolution of the live stream
    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.stream.as_ref().map(|s| s.resolution())
    }

    /// Grab the current frame
    pub fn read_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::Released)?;
        stream.read_frame()
    }

    /// Stop the stream now
    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            debug!("Camera stream released");
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("constraints", &self.constraints)
            .field("live", &self.stream.is_some())
            .finish()
    }
}

/// Acquires, reads and releases the camera on behalf of the workflow
#[derive(Clone)]
pub struct CaptureController {
    device: Arc<dyn CameraDevice>,
    encoder: ImageEncoder,
}

impl CaptureController {
    /// Create a controller for `device`
    pub fn new(device: Arc<dyn CameraDevice>, encoder: ImageEncoder) -> Self {
        Self { device, encoder }
    }

    /// Acquire a stream, preferring `preferred` and falling back to any camera
    pub async fn acquire(&self, preferred: FacingMode) -> Result<CameraSession, CaptureError> {
        let constrained = StreamConstraints::facing(preferred);
        let constrained_err = match self.device.open(constrained).await {
            Ok(stream) => {
                info!("Camera acquired facing {:?}", preferred);
                return Ok(CameraSession::new(stream, constrained));
            }
            Err(e) => e,
        };

        warn!(
            "Could not open {:?} camera ({}), falling back to any camera",
            preferred, constrained_err
        );

        match self.device.open(StreamConstraints::any()).await {
            Ok(stream) => {
                info!("Camera acquired without facing constraint");
                Ok(CameraSession::new(stream, StreamConstraints::any()))
            }
            Err(fallback_err) => {
                error!("Error accessing any camera: {}", fallback_err);
                Err(CaptureError::CameraUnavailable {
                    constrained: Box::new(constrained_err),
                    fallback: Box::new(fallback_err),
                })
            }
        }
    }

    /// Grab the current frame and encode it as a JPEG data URL
    pub fn capture_frame(&self, session: &mut CameraSession) -> Result<EncodedImage, CaptureError> {
        debug!(
            "Capturing {:?} frame from camera {:?} at JPEG quality {}",
            session.resolution(),
            session.constraints().facing,
            self.encoder.quality()
        );
        let frame = session.read_frame()?;
        self.encoder.encode(frame)
    }

    /// Stop the session's stream
    pub fn release(&self, session: CameraSession) {
        session.release();
    }
}
