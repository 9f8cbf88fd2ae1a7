//! Public API error taxonomy.
//!
//! Every error is terminal to the call that raised it. The HTTP layer
//! serializes errors as `{ok, code, message}` so clients can branch on
//! `code` without parsing prose.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed caller input. Not retryable.
    #[error("{0}")]
    InvalidRequest(String),
    /// Pre-flight context check failed; no backend call was made.
    #[error("request context is too long for {provider} ({max_tokens} token limit); shorten it or pick another provider")]
    ContextTooLarge {
        provider: &'static str,
        max_tokens: usize,
    },
    /// Anonymous generation budget used up.
    #[error("free generations used up, log in to keep going")]
    QuotaExceeded,
    /// Billing condition reported by the inference backend.
    #[error("{0}")]
    PaymentRequired(String),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("deployment failed: {0}")]
    DeploymentFailed(String),
    /// Remix target missing, private, or not a static site.
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::ContextTooLarge { .. } => "context_too_large",
            ApiError::QuotaExceeded => "quota_exceeded",
            ApiError::PaymentRequired(_) => "payment_required",
            ApiError::GenerationFailed(_) => "generation_failed",
            ApiError::DeploymentFailed(_) => "deployment_failed",
            ApiError::NotFound(_) => "not_found",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::ContextTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ApiError::GenerationFailed(_) | ApiError::DeploymentFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "ok": false,
            "code": self.code(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
