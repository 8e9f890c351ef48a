//! JPEG encoding of captured frames into data URLs

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use super::frame::CapturedFrame;
use super::CaptureError;
use crate::shared::{EncodedImage, JPEG_MIME};

/// Default JPEG quality (0.9 on a 0..1 scale)
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encodes raster frames as base64 JPEG data URLs
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    quality: u8,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageEncoder {
    /// Create an encoder; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// JPEG quality in use
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a frame at its native resolution
    pub fn encode(&self, frame: CapturedFrame) -> Result<EncodedImage, CaptureError> {
        if !frame.is_complete() {
            return Err(CaptureError::InvalidFrame {
                width: frame.width,
                height: frame.height,
                len: frame.data.len(),
            });
        }

        let (width, height) = frame.dimensions();
        let captured_at = frame.timestamp;
        let len = frame.data.len();
        let raster = RgbaImage::from_raw(width, height, frame.data)
            .ok_or(CaptureError::InvalidFrame { width, height, len })?;

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgba8(raster).to_rgb8();

        let mut jpeg = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, self.quality);
            encoder.encode_image(&rgb)?;
        }

        debug!(
            "Encoded {}x{} frame as {} byte JPEG {:?} after capture",
            width,
            height,
            jpeg.len(),
            captured_at.elapsed()
        );

        Ok(EncodedImage::from_base64(JPEG_MIME, &STANDARD.encode(&jpeg)))
    }
}
