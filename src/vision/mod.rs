//! Vision Model Layer
//!
//! Describes requests to the external image-understanding model and the
//! backends that execute them. Supported backends:
//! - Gemini `generateContent` over HTTPS

pub mod gemini;
pub mod schema;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;

use crate::shared::JPEG_MIME;

pub use gemini::GeminiModel;
pub use schema::{ResponseSchema, SchemaViolation};

/// Instruction sent alongside every cloud photo
pub const SHAPE_INSTRUCTION: &str = "Analyze this image of clouds and creatively identify shapes of objects or animals you see. Be imaginative. Describe each shape you find. If you can't find any clear shapes, return an empty array. Return the result as a JSON array.";

/// Sampling temperature for shape generation
pub const SHAPE_TEMPERATURE: f32 = 0.7;

/// Credential for the model API
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank values
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// The raw key, for request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// One part of a multimodal model request
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Base64 payload with its MIME type
    InlineData { mime_type: String, data: String },
    /// Plain instruction text
    Text(String),
}

/// A complete request to the vision model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub parts: Vec<Part>,
    pub schema: ResponseSchema,
    pub temperature: f32,
}

/// Why a request was refused before reaching the model
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestViolation {
    #[error("expected exactly 2 parts, found {0}")]
    PartCount(usize),
    #[error("first part must be inline image/jpeg data")]
    ImagePart,
    #[error("image payload is empty or not valid base64")]
    ImagePayload,
    #[error("second part must be non-empty instruction text")]
    TextPart,
    #[error("temperature {0} is outside 0.0..=2.0")]
    Temperature(String),
}

impl ModelRequest {
    /// The fixed cloud-shape request for a raw base64 JPEG payload
    pub fn cloud_shapes(jpeg_base64: &str) -> Self {
        Self {
            parts: vec![
                Part::InlineData {
                    mime_type: JPEG_MIME.to_string(),
                    data: jpeg_base64.to_string(),
                },
                Part::Text(SHAPE_INSTRUCTION.to_string()),
            ],
            schema: ResponseSchema::cloud_shapes(),
            temperature: SHAPE_TEMPERATURE,
        }
    }

    /// Check the request's shape before it is sent
    pub fn validate(&self) -> Result<(), RequestViolation> {
        let [image, text] = self.parts.as_slice() else {
            return Err(RequestViolation::PartCount(self.parts.len()));
        };

        match image {
            Part::InlineData { mime_type, data } if mime_type == JPEG_MIME => {
                if data.is_empty() || STANDARD.decode(data).is_err() {
                    return Err(RequestViolation::ImagePayload);
                }
            }
            _ => return Err(RequestViolation::ImagePart),
        }

        match text {
            Part::Text(text) if !text.trim().is_empty() => {}
            _ => return Err(RequestViolation::TextPart),
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RequestViolation::Temperature(self.temperature.to_string()));
        }

        Ok(())
    }
}

/// Failures talking to the model backend
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Transport failure or timeout
    #[error("Model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The API answered without any text
    #[error("The model returned an empty response.")]
    EmptyResponse,
}

/// An external model that answers image + text prompts with JSON text
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Run `request` and return the model's raw JSON text
    async fn generate(&self, key: &ApiKey, request: &ModelRequest) -> Result<String, ModelError>;
}
