//! Raster frame grabbed from a live camera stream

use std::time::Instant;

/// A single still frame at the stream's native resolution
#[derive(Debug)]
pub struct CapturedFrame {
    /// Raw RGBA pixel data, row major
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the buffer holds exactly `width * height` RGBA pixels
    pub fn is_complete(&self) -> bool {
        let expected = self.width as usize * self.height as usize * 4;
        self.width > 0 && self.height > 0 && self.data.len() == expected
    }
}
