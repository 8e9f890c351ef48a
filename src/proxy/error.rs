//! Proxy errors and their HTTP rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::shared::ErrorBody;
use crate::vision::SchemaViolation;

/// Fallback message when an error carries no text of its own
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal server error occurred.";

/// Broad class of a proxy error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Operator must fix the deployment
    Configuration,
    /// Caller must resend valid input
    Input,
    /// The model call failed or answered with unusable output
    Upstream,
}

/// Everything that can go wrong while handling `POST /api/analyze`
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Server configuration error: API key is missing.")]
    MissingApiKey,

    #[error("Bad request: No body provided.")]
    MissingBody,

    /// The body exceeds the configured size limit
    #[error("Payload too large: the image must be at most {limit} bytes once encoded.")]
    BodyTooLarge { limit: usize },

    /// The body could not be read from the connection
    #[error("Bad request: Body could not be read: {0}")]
    UnreadableBody(String),

    #[error("Bad request: Body is not valid JSON.")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Bad request: Image data is missing.")]
    MissingImage,

    #[error("Invalid image data format.")]
    InvalidImageFormat,

    /// The model call itself failed; carries the failure text
    #[error("{0}")]
    Upstream(String),

    /// The model answered with text that violates the response schema
    #[error("The model returned a response that does not match the expected format.")]
    InvalidModelOutput(String),

    /// The request could not be built
    #[error("{}", INTERNAL_ERROR_MESSAGE)]
    Internal(String),
}

impl From<SchemaViolation> for ProxyError {
    fn from(violation: SchemaViolation) -> Self {
        ProxyError::InvalidModelOutput(violation.to_string())
    }
}

impl ProxyError {
    /// Class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            ProxyError::MissingApiKey => ErrorClass::Configuration,
            ProxyError::MissingBody
            | ProxyError::BodyTooLarge { .. }
            | ProxyError::UnreadableBody(_)
            | ProxyError::InvalidJson(_)
            | ProxyError::MissingImage
            | ProxyError::InvalidImageFormat => ErrorClass::Input,
            ProxyError::Upstream(_)
            | ProxyError::InvalidModelOutput(_)
            | ProxyError::Internal(_) => ErrorClass::Upstream,
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        if let ProxyError::BodyTooLarge { .. } = self {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        match self.class() {
            ErrorClass::Input => StatusCode::BAD_REQUEST,
            ErrorClass::Configuration | ErrorClass::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message, never empty
    pub fn message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        match self.class() {
            ErrorClass::Input => tracing::warn!(
                status = %status,
                message = %message,
                "Rejected analysis request"
            ),
            ErrorClass::Configuration | ErrorClass::Upstream => tracing::error!(
                status = %status,
                message = %message,
                detail = ?self,
                "Analysis request failed"
            ),
        }

        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_by_class() {
        assert_eq!(ProxyError::MissingApiKey.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ProxyError::MissingBody.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::MissingImage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ProxyError::InvalidImageFormat.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::BodyTooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ProxyError::BodyTooLarge { limit: 10 }.class(), ErrorClass::Input);
        assert_eq!(
            ProxyError::Upstream("quota".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_empty_upstream_message_falls_back() {
        assert_eq!(
            ProxyError::Upstream(String::new()).message(),
            INTERNAL_ERROR_MESSAGE
        );
    }

    #[test]
    fn test_upstream_message_is_verbatim() {
        assert_eq!(
            ProxyError::Upstream("Resource has been exhausted".to_string()).message(),
            "Resource has been exhausted"
        );
    }
}
