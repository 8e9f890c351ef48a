//! Camera device backed by a still image
//!
//! Serves the same picture on every frame. Used by the headless `gaze`
//! command, where a photo on disk stands in for the device camera.

use async_trait::async_trait;
use image::RgbaImage;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::frame::CapturedFrame;
use super::{CameraDevice, CaptureError, FacingMode, MediaStream, StreamConstraints};

/// A virtual camera that always shows one picture
pub struct StillImageCamera {
    picture: Arc<RgbaImage>,
    facing: Option<FacingMode>,
    live_streams: Arc<AtomicUsize>,
}

impl StillImageCamera {
    /// Camera showing an in-memory picture
    ///
    /// `facing` is what the camera reports; `None` matches only
    /// unconstrained requests.
    pub fn from_image(picture: RgbaImage, facing: Option<FacingMode>) -> Self {
        Self {
            picture: Arc::new(picture),
            facing,
            live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Camera showing the picture stored at `path`
    pub fn open_file(path: &Path, facing: Option<FacingMode>) -> Result<Self, CaptureError> {
        let picture = image::open(path)?.to_rgba8();
        Ok(Self::from_image(picture, facing))
    }

    /// Number of streams handed out and not yet stopped
    #[cfg(test)]
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn open(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, CaptureError> {
        if let Some(wanted) = constraints.facing {
            if self.facing != Some(wanted) {
                return Err(CaptureError::NoMatchingDevice(format!(
                    "still image camera does not face {:?}",
                    wanted
                )));
            }
        }

        let (width, height) = self.picture.dimensions();
        if width == 0 || height == 0 {
            return Err(CaptureError::Device(
                "still image camera has an empty picture".to_string(),
            ));
        }

        self.live_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StillImageStream {
            picture: self.picture.clone(),
            live_streams: self.live_streams.clone(),
            stopped: false,
        }))
    }
}

struct StillImageStream {
    picture: Arc<RgbaImage>,
    live_streams: Arc<AtomicUsize>,
    stopped: bool,
}

impl MediaStream for StillImageStream {
    fn resolution(&self) -> (u32, u32) {
        self.picture.dimensions()
    }

    fn read_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Released);
        }
        let (width, height) = self.picture.dimensions();
        Ok(CapturedFrame::new(
            self.picture.as_raw().clone(),
            width,
            height,
        ))
    }

    fn stop_tracks(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
