//! Data objects passed between capture, analysis and the proxy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// MIME type of every image produced by the capture layer
pub const JPEG_MIME: &str = "image/jpeg";

/// How an encoded payload is framed for transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEncoding {
    /// `data:<mime>;base64,<payload>`
    Base64DataUrl,
}

/// A compressed still image ready to be sent for analysis
///
/// Cloning is cheap: the data URL is shared, never copied.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    encoding: TransportEncoding,
    data_url: Arc<str>,
}

impl EncodedImage {
    /// Wrap an already base64-encoded payload as a data URL
    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        let data_url = format!("data:{};base64,{}", mime_type, payload);
        Self {
            mime_type: mime_type.to_string(),
            encoding: TransportEncoding::Base64DataUrl,
            data_url: Arc::from(data_url),
        }
    }

    /// MIME type of the compressed image
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Transport framing of the payload
    pub fn encoding(&self) -> TransportEncoding {
        self.encoding
    }

    /// Full data URL, as sent over the wire
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// Base64 payload without the data URL header
    pub fn payload(&self) -> &str {
        split_data_url(&self.data_url)
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }
}

impl fmt::Debug for EncodedImage {
    // Payloads run to megabytes; keep logs readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("mime_type", &self.mime_type)
            .field("encoding", &self.encoding)
            .field("len", &self.data_url.len())
            .finish()
    }
}

/// Split a data URL at its first comma into `(header, payload)`
///
/// Returns `None` when there is no comma at all.
pub fn split_data_url(data_url: &str) -> Option<(&str, &str)> {
    data_url.split_once(',')
}

/// One imagined shape found in the clouds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudShape {
    /// What the cloud looks like, e.g. "Dragon"
    pub shape: String,
    /// Free-text description of where and how the shape appears
    pub description: String,
}

/// Shapes in model output order; empty when nothing was found
pub type AnalysisResult = Vec<CloudShape>;
