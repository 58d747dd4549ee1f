//! API error taxonomy and HTTP status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced to the chat endpoint caller as `{"error": ...}` bodies.
///
/// Failures in optional enrichment paths (context assembly, parts lookup)
/// never reach this type; they are swallowed at the call site.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("OPENAI_API_KEY environment variable is required")]
    MissingConfig,

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::EmptyMessage => StatusCode::BAD_REQUEST,
            ApiError::MissingConfig => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Llm(err) => match err {
                LlmError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
                LlmError::Auth => StatusCode::UNAUTHORIZED,
                LlmError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                LlmError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                LlmError::EmptyResponse => StatusCode::INTERNAL_SERVER_ERROR,
                LlmError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_bad_request() {
        assert_eq!(ApiError::EmptyMessage.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn llm_errors_map_to_distinct_statuses() {
        assert_eq!(
            ApiError::from(LlmError::Auth).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(LlmError::RateLimited).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(LlmError::Upstream {
                status: 503,
                message: "overloaded".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
