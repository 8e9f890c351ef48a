//! HTTP client for the analysis proxy

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{AnalysisError, Analyzer, UNKNOWN_SERVER_ERROR};
use crate::shared::{AnalysisResult, AnalyzeRequest, EncodedImage, ErrorBody};

/// Calls `POST /api/analyze` on the proxy
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AnalysisClient {
    /// Create a client for `endpoint`; `timeout` bounds the whole round trip
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint this client posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, image: &EncodedImage) -> Result<AnalysisResult, AnalysisError> {
        let request = AnalyzeRequest {
            image: Some(image.data_url().to_string()),
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) if !body.message.is_empty() => body.message,
                Ok(_) => format!("Server responded with status: {}", status.as_u16()),
                Err(_) => UNKNOWN_SERVER_ERROR.to_string(),
            };
            warn!("Analysis proxy returned {}: {}", status, message);
            return Err(AnalysisError::Upstream(message));
        }

        let body: serde_json::Value = response.json().await?;
        if !body.is_array() {
            error!("API response was not in the expected array format: {}", body);
            return Err(AnalysisError::ResponseFormat);
        }

        serde_json::from_value(body).map_err(|e| {
            error!("API response items do not match the shape format: {}", e);
            AnalysisError::ResponseFormat
        })
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(&self, image: &EncodedImage) -> Result<AnalysisResult, AnalysisError> {
        debug!("Sending {:?} to {}", image, self.endpoint);
        let result = self.call(image).await;
        if let Err(e) = &result {
            error!("Error calling backend analysis function: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::CloudShape;
    use crate::shared::JPEG_MIME;
    use mockito::Matcher;

    fn image() -> EncodedImage {
        EncodedImage::from_base64(JPEG_MIME, "QQ==")
    }

    fn client(server: &mockito::ServerGuard) -> AnalysisClient {
        AnalysisClient::new(format!("{}/api/analyze", server.url()), Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn test_shapes_pass_through_unchanged() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"[
            {"shape":"Whale","description":"A long body stretching east"},
            {"shape":"Teapot","description":"Spout on the right"},
            {"shape":"Whale","description":"A second, smaller whale"}
        ]"#;
        let mock = server
            .mock("POST", "/api/analyze")
            .match_body(Matcher::Json(serde_json::json!({
                "image": "data:image/jpeg;base64,QQ=="
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let result = client(&server).analyze(&image()).await.unwrap();

        mock.assert_async().await;
        let shapes: Vec<(&str, &str)> = result
            .iter()
            .map(|s| (s.shape.as_str(), s.description.as_str()))
            .collect();
        assert_eq!(
            shapes,
            vec![
                ("Whale", "A long body stretching east"),
                ("Teapot", "Spout on the right"),
                ("Whale", "A second, smaller whale"),
            ]
        );
    }

    #[tokio::test]
    async fn test_payload_too_large_message_is_shown() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(413)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Payload too large: the image must be at most 1024 bytes once encoded."}"#)
            .create_async()
            .await;

        let err = client(&server).analyze(&image()).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to analyze image: Payload too large: the image must be at most 1024 bytes once encoded."
        );
    }

    #[tokio::test]
    async fn test_empty_array_is_valid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let result = client(&server).analyze(&image()).await.unwrap();
        assert_eq!(result, Vec::<CloudShape>::new());
    }

    #[tokio::test]
    async fn test_object_body_is_format_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let err = client(&server).analyze(&image()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseFormat));
    }

    #[tokio::test]
    async fn test_server_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(500)
            .with_body(r#"{"message":"Server configuration error: API key is missing."}"#)
            .create_async()
            .await;

        let err = client(&server).analyze(&image()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to analyze image: Server configuration error: API key is missing."
        );
    }

    #[tokio::test]
    async fn test_unreadable_error_body_uses_generic_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = client(&server).analyze(&image()).await.unwrap_err();
        match err {
            AnalysisError::Upstream(message) => assert_eq!(message, UNKNOWN_SERVER_ERROR),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_body_without_message_reports_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(503)
            .with_body("{}")
            .create_async()
            .await;

        let err = client(&server).analyze(&image()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to analyze image: Server responded with status: 503"
        );
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_network_error() {
        // Port 9 (discard) is not expected to accept HTTP connections
        let client =
            AnalysisClient::new("http://127.0.0.1:9/api/analyze", Duration::from_secs(2)).unwrap();

        let err = client.analyze(&image()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Network(_)));
        assert!(err.to_string().starts_with("Failed to analyze image: "));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).analyze(&image()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Network(_)));
    }
}
