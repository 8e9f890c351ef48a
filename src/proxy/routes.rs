//! HTTP routes for the analysis proxy

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{AnalysisProxyService, ProxyError};

/// Request body limit that fits a base64 native-resolution camera JPEG
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
struct ProxyState {
    service: Arc<AnalysisProxyService>,
    max_body_bytes: usize,
}

/// Create the proxy router; bodies above `max_body_bytes` are refused with 413
pub fn create_router(service: Arc<AnalysisProxyService>, max_body_bytes: usize) -> Router {
    let state = ProxyState {
        service,
        max_body_bytes,
    };
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

/// POST /api/analyze - forward one cloud photo to the model
async fn analyze(
    State(state): State<ProxyState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("analyze", %request_id);

    async move {
        let body = match body {
            Ok(body) => body,
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return ProxyError::BodyTooLarge {
                    limit: state.max_body_bytes,
                }
                .into_response();
            }
            Err(rejection) => {
                return ProxyError::UnreadableBody(rejection.body_text()).into_response();
            }
        };

        match state.service.analyze(Some(&body[..])).await {
            Ok(json) => {
                tracing::info!("Analysis succeeded");
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "application/json")],
                    json,
                )
                    .into_response()
            }
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

/// GET /health - liveness probe
async fn health() -> &'static str {
    "ok"
}
