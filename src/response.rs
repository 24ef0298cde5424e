//! JSON bodies shared by the API's success and error responses.
//!
//! Every response carries a `success` flag so clients can tell the two shapes
//! apart without looking at the status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// The body of every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// A human-readable explanation of what went wrong.
    pub message: String,
    /// Diagnostic detail for operators, omitted for input errors.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Create an error body with an optional diagnostic.
    pub fn new(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error,
        }
    }

    /// Render the body as JSON with `status`.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Render `body` as JSON with `status`.
///
/// `body` is expected to contain its own `success: true` field.
pub fn render_json<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

/// The response for routes that do not exist.
pub async fn get_404_not_found() -> Response {
    ErrorBody::new("Not found", None).into_response_with(StatusCode::NOT_FOUND)
}
