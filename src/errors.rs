use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Everything that can go wrong while relaying one request. The mapping from
/// error kind to HTTP status lives in the `IntoResponse` impl below and
/// nowhere else.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The body deserialized but failed shape validation. One entry per
    /// violated field.
    #[error("malformed request: {0:?}")]
    MalformedRequest(Vec<String>),
    /// The upstream call failed: non-2xx status, transport error, or timeout.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::MalformedRequest(violations) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": violations })),
            )
                .into_response(),
            RelayError::Upstream(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": detail })),
            )
                .into_response(),
        }
    }
}
