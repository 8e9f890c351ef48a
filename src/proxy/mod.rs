//! Analysis Proxy Service
//!
//! Holds the model credential on behalf of untrusted clients. Each call is
//! handled independently:
//! 1. check the credential is configured
//! 2. validate the body and pull out the image data URL
//! 3. strip the data URL header and build the fixed two-part model request
//! 4. call the model under the declared response schema
//! 5. check the answer against the schema and return it verbatim

pub mod error;
pub mod routes;

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::shared::{split_data_url, AnalyzeRequest};
use crate::vision::{ApiKey, ModelRequest, RequestViolation, ResponseSchema, VisionModel};

pub use error::ProxyError;
pub use routes::{create_router, DEFAULT_MAX_BODY_BYTES};

/// Stateless handler for `POST /api/analyze`
pub struct AnalysisProxyService {
    api_key: Option<ApiKey>,
    model: Arc<dyn VisionModel>,
    schema: ResponseSchema,
}

impl AnalysisProxyService {
    /// Create the service; `api_key` is read once by the caller at startup
    pub fn new(api_key: Option<ApiKey>, model: Arc<dyn VisionModel>) -> Self {
        if api_key.is_none() {
            error!("API key is not configured; every analysis request will fail");
        }
        Self {
            api_key,
            model,
            schema: ResponseSchema::cloud_shapes(),
        }
    }

    /// Handle one request body, returning the model's JSON text
    pub async fn analyze(&self, body: Option<&[u8]>) -> Result<String, ProxyError> {
        let api_key = self.api_key.as_ref().ok_or(ProxyError::MissingApiKey)?;

        let body = body
            .filter(|b| !b.is_empty())
            .ok_or(ProxyError::MissingBody)?;

        let request: AnalyzeRequest =
            serde_json::from_slice(body).map_err(ProxyError::InvalidJson)?;
        let image = request
            .image
            .filter(|image| !image.is_empty())
            .ok_or(ProxyError::MissingImage)?;

        let payload = split_data_url(&image)
            .map(|(_, payload)| payload)
            .filter(|payload| !payload.is_empty())
            .ok_or(ProxyError::InvalidImageFormat)?;

        let model_request = ModelRequest::cloud_shapes(payload);
        model_request.validate().map_err(|violation| match violation {
            RequestViolation::ImagePayload => ProxyError::InvalidImageFormat,
            other => ProxyError::Internal(other.to_string()),
        })?;

        info!("Forwarding {} byte image payload to model", payload.len());

        let text = self
            .model
            .generate(api_key, &model_request)
            .await
            .map_err(|e| {
                error!("Error in model API call: {}", e);
                ProxyError::Upstream(e.to_string())
            })?;

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ProxyError::InvalidModelOutput(e.to_string()))?;
        self.schema.validate(&value)?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::error::ErrorClass;
    use crate::vision::{ModelError, Part};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Model that records requests and answers with a canned result
    struct FakeModel {
        answer: Result<String, String>,
        seen: Mutex<Vec<ModelRequest>>,
    }

    impl FakeModel {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VisionModel for FakeModel {
        async fn generate(
            &self,
            _key: &ApiKey,
            request: &ModelRequest,
        ) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(ModelError::Api {
                    status: 429,
                    message: message.clone(),
                }),
            }
        }
    }

    fn service(model: Arc<FakeModel>) -> AnalysisProxyService {
        AnalysisProxyService::new(ApiKey::new("key"), model)
    }

    const VALID_BODY: &[u8] = br#"{"image":"data:image/jpeg;base64,QQ=="}"#;

    #[tokio::test]
    async fn test_missing_api_key() {
        let model = FakeModel::answering("[]");
        let service = AnalysisProxyService::new(None, model.clone());

        let err = service.analyze(Some(VALID_BODY)).await.unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "Server configuration error: API key is missing.");
        assert!(model.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_body() {
        let service = service(FakeModel::answering("[]"));
        for body in [None, Some(&b""[..])] {
            let err = service.analyze(body).await.unwrap_err();
            assert_eq!(err.status(), 400);
            assert_eq!(err.message(), "Bad request: No body provided.");
        }
    }

    #[tokio::test]
    async fn test_missing_image() {
        let service = service(FakeModel::answering("[]"));
        let bodies: [&[u8]; 3] = [br#"{}"#, br#"{"image":""}"#, br#"{"image":null}"#];
        for body in bodies {
            let err = service.analyze(Some(body)).await.unwrap_err();
            assert_eq!(err.status(), 400);
            assert_eq!(err.message(), "Bad request: Image data is missing.");
        }
    }

    #[tokio::test]
    async fn test_body_not_json() {
        let service = service(FakeModel::answering("[]"));
        let err = service.analyze(Some(&b"image=abc"[..])).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidJson(_)));
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_data_url_without_comma() {
        let service = service(FakeModel::answering("[]"));
        let err = service
            .analyze(Some(&br#"{"image":"data:image/jpeg;base64"}"#[..]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.message(), "Invalid image data format.");
    }

    #[tokio::test]
    async fn test_data_url_with_empty_payload() {
        let service = service(FakeModel::answering("[]"));
        let err = service
            .analyze(Some(&br#"{"image":"data:image/jpeg;base64,"}"#[..]))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Invalid image data format.");
    }

    #[tokio::test]
    async fn test_forwards_raw_payload() {
        let model = FakeModel::answering("[]");
        service(model.clone()).analyze(Some(VALID_BODY)).await.unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].parts[0],
            Part::InlineData {
                mime_type: "image/jpeg".to_string(),
                data: "QQ==".to_string()
            }
        );
        assert!(matches!(seen[0].parts[1], Part::Text(_)));
        assert_eq!(seen[0].schema, ResponseSchema::cloud_shapes());
    }

    #[tokio::test]
    async fn test_model_text_returned_verbatim() {
        let text = r#"[{"shape":"Owl","description":"Two round eyes"},{"shape":"Boot","description":"Heel to the west"}]"#;
        let result = service(FakeModel::answering(text))
            .analyze(Some(VALID_BODY))
            .await
            .unwrap();
        assert_eq!(result, text);
    }

    #[tokio::test]
    async fn test_model_failure_is_upstream_error() {
        let err = service(FakeModel::failing("Resource has been exhausted"))
            .analyze(Some(VALID_BODY))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Upstream);
        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "Resource has been exhausted");
    }

    #[tokio::test]
    async fn test_schema_violation_is_rejected() {
        let err = service(FakeModel::answering(r#"{"shape":"Owl"}"#))
            .analyze(Some(VALID_BODY))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidModelOutput(_)));
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_non_json_model_output_is_rejected() {
        let err = service(FakeModel::answering("Here are some shapes!"))
            .analyze(Some(VALID_BODY))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidModelOutput(_)));
    }
}
