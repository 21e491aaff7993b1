//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Thin JSON surface over the two adapters. Handlers only translate HTTP to
//! calls on `AppState` and errors to [`ApiError`]; no mapping or protocol
//! logic lives here.

pub mod ai;
pub mod config;
pub mod emr;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

use crate::emr::EmrError;
use crate::error::ErrorCode;
use crate::llm::types::GatewayError;
use crate::state::AppState;

/// All API routes with CORS and per-request tracing spans.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        info_span!(
            "http",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %Uuid::new_v4(),
        )
    });

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/integrations/config", get(config::get_config).put(config::update_config))
        .route("/api/ai/analyze", post(ai::analyze))
        .route("/api/emr/test", get(emr::test_connection))
        .route("/api/emr/patients/{id}", get(emr::pull_patient))
        .route("/api/emr/counseling", post(emr::push_counseling))
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERRORS
// =============================================================================

/// Hard failure rendered as `{ "error": { "code", "message", "retryable" } }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    fn from_code(status: StatusCode, err: &impl ErrorCode) -> Self {
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "retryable": self.retryable,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::Configuration(_) => StatusCode::BAD_REQUEST,
            GatewayError::ProviderUnavailable { .. } | GatewayError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_code(status, &err)
    }
}

impl From<EmrError> for ApiError {
    fn from(err: EmrError) -> Self {
        let status = match &err {
            EmrError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            EmrError::Configuration(_) | EmrError::InvalidId(_) | EmrError::Mapping(_) => StatusCode::BAD_REQUEST,
            EmrError::Status { status: 404, .. } => StatusCode::NOT_FOUND,
            EmrError::Transport { .. } | EmrError::Status { .. } | EmrError::Parse { .. } => StatusCode::BAD_GATEWAY,
            EmrError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_code(status, &err)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
