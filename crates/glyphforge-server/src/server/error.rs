//! HTTP mapping for pipeline errors.
//!
//! Mirrors the pipeline's error taxonomy onto status codes: validation
//! failures are the caller's fault (400), an unresolved identifier is a
//! miss (404), and synthesizer/packaging/storage failures are internal
//! (500). Bodies are always `{"error": "<message>"}`.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use glyphforge::Error;
use serde_json::json;

/// Transport-facing wrapper for everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// A pipeline error, mapped per the taxonomy above.
    Pipeline(Error),
    /// The request itself was malformed before it reached the pipeline
    /// (e.g. an unreadable multipart body).
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Pipeline(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Pipeline(err) => {
                let status = match &err {
                    Error::EmptyBatch
                    | Error::BatchTooLarge { .. }
                    | Error::UnsupportedFile { .. }
                    | Error::NoMappings
                    | Error::DuplicateTarget { .. }
                    | Error::InvalidCodepoint { .. } => StatusCode::BAD_REQUEST,
                    Error::AssetNotFound { .. } => StatusCode::NOT_FOUND,
                    Error::Synthesis { .. }
                    | Error::Archive { .. }
                    | Error::Store { .. }
                    | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!("request failed: {message}");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
