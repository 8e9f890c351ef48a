//! Analysis Layer
//!
//! Sends captured images to the analysis proxy and validates what comes back.

pub mod client;

use async_trait::async_trait;

use crate::shared::{AnalysisResult, EncodedImage};

pub use client::AnalysisClient;

/// Generic message when the proxy's error body cannot be read
pub const UNKNOWN_SERVER_ERROR: &str = "An unknown error occurred on the server.";

/// Message for a success response that is not a list of shapes
pub const UNEXPECTED_FORMAT: &str = "The AI returned an unexpected response format.";

/// Failures of a single analysis call
///
/// Every variant renders with the same `Failed to analyze image:` prefix so
/// the workflow can show it to the user as is.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The proxy answered with a non-success status
    #[error("Failed to analyze image: {0}")]
    Upstream(String),

    /// The proxy answered 2xx but the body is not a list of shapes
    #[error("Failed to analyze image: {}", UNEXPECTED_FORMAT)]
    ResponseFormat,

    /// The proxy could not be reached or the body could not be read
    #[error("Failed to analyze image: {0}")]
    Network(#[from] reqwest::Error),
}

/// Turns an encoded image into a list of cloud shapes
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one image; suspends until the remote call settles
    async fn analyze(&self, image: &EncodedImage) -> Result<AnalysisResult, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_share_prefix() {
        let upstream = AnalysisError::Upstream("quota exceeded".to_string());
        assert_eq!(upstream.to_string(), "Failed to analyze image: quota exceeded");
        assert_eq!(
            AnalysisError::ResponseFormat.to_string(),
            "Failed to analyze image: The AI returned an unexpected response format."
        );
    }
}
