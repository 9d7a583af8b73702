//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_core::text::diagnostic_excerpt;
use parley_runtime::BridgeError;
use serde_json::json;
use thiserror::Error;

/// Every non-2xx outcome of the HTTP surface. Rendered as
/// `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Admission cap reached.
    #[error("Too many requests (max {max} concurrent)")]
    TooManyRequests {
        /// Configured cap.
        max: usize,
    },

    /// Body unreadable, over the limit, or not a JSON object of the
    /// expected shape.
    #[error("Invalid JSON body")]
    InvalidBody,

    /// `prompt` missing or blank.
    #[error("prompt is required")]
    MissingPrompt,

    /// No such route.
    #[error("Not found")]
    NotFound,

    /// The round trip failed. Carries the already-truncated message.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidBody | Self::MissingPrompt => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::AdmissionRejected { max } => Self::TooManyRequests { max },
            other => Self::Internal(diagnostic_excerpt(&other.to_string())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
