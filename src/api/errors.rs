//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": "message"}`. Parse failures from the LLM also
//! carry the raw model output under `"raw"`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::agent::AgentError;
use crate::mapping::MapError;
use crate::storage::StorageError;
use crate::sync::SyncError;

/// Application-level error type that implements `IntoResponse`.
///
/// - `BadRequest` → 400
/// - `Unauthorized` → 401 (with a basic-auth challenge)
/// - `NotFound` → 404
/// - `Internal` → 500
/// - `Parse` → 500 with the offending model output
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(String),
    Parse { message: String, raw: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
            ApiError::Parse { message, raw } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "raw": raw }),
            ),
            ApiError::Unauthorized(msg) => {
                let mut resp =
                    (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": msg }))).into_response();
                resp.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"Admin Area\""),
                );
                return resp;
            }
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Parse { message, raw } => ApiError::Parse {
                message: format!("failed to parse response: {}", message),
                raw,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ApiError::NotFound("Document not found".to_string()),
            StorageError::DuplicateUrl(_) | StorageError::DuplicateId(_) => {
                ApiError::BadRequest(e.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Fetch(_) | SyncError::Render(_) => ApiError::BadRequest(e.to_string()),
            SyncError::NotFound(_) => ApiError::NotFound("Document not found".to_string()),
            SyncError::Summarize(agent) => agent.into(),
            SyncError::Storage(storage) => storage.into(),
            SyncError::Io(io) => ApiError::Internal(io.to_string()),
        }
    }
}

impl From<MapError> for ApiError {
    fn from(e: MapError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}
