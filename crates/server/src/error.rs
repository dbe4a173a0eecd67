//! Failure-to-envelope translation.
//!
//! Every handler error becomes the same `{success, message, data}` envelope
//! the success path uses, with a status code that reflects the error kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use modelchain_llm::LlmError;
use tracing::error;

use crate::api::ApiResponse;

#[derive(Debug)]
pub enum ApiError {
    /// Bad request shape or values; no state was changed.
    Validation(String),
    /// Lookup miss on an id.
    NotFound(String),
    /// The upstream LLM (or another external collaborator) failed.
    Upstream(String),
    /// Anything else; logged with its full chain.
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        if let Some(llm) = error.downcast_ref::<LlmError>() {
            return match llm {
                LlmError::Auth => {
                    Self::Upstream("upstream authentication failed — check the API key".to_string())
                }
                other => Self::Upstream(other.to_string()),
            };
        }
        Self::Internal(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Upstream(message) => (StatusCode::BAD_GATEWAY, message),
            Self::Internal(error) => {
                error!(error = ?error, "internal error while handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ApiResponse::<()>::failure(message))).into_response()
    }
}
