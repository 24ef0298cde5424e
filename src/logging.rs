//! Middleware for logging requests and responses.

use axum::{
    body::Body,
    extract::Request,
    http::{
        StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::response::ErrorBody;

/// The number of characters of a body that are logged at the `info` level.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
///
/// Multipart requests carry receipt files, so their bodies are passed through
/// untouched and only their declared length is logged.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request = if is_multipart(&request) {
        let length = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unknown");
        tracing::info!(
            "Received request: {:#?}\nbody: <multipart form, {length} bytes>",
            request.headers()
        );
        request
    } else {
        let (parts, body) = request.into_parts();
        let body_text = match read_body_text(body).await {
            Ok(text) => text,
            Err(error) => {
                tracing::debug!("Could not read request body: {error}");
                return ErrorBody::new("The request body could not be read.", None)
                    .into_response_with(StatusCode::BAD_REQUEST);
            }
        };
        log_body("Received request", &parts, &body_text);
        Request::from_parts(parts, body_text.into())
    };

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    match read_body_text(body).await {
        Ok(body_text) => {
            log_body("Sending response", &parts, &body_text);
            Response::from_parts(parts, body_text.into())
        }
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/"))
}

async fn read_body_text(body: Body) -> Result<String, axum::Error> {
    let bytes = axum::body::to_bytes(body, usize::MAX).await?;

    Ok(String::from_utf8_lossy(&bytes).to_string())
}

fn log_body(prefix: &str, parts: &impl std::fmt::Debug, body: &str) {
    match truncate(body) {
        Some(truncated) => {
            tracing::info!("{prefix}: {parts:#?}\nbody: {truncated}...");
            tracing::debug!("Full body: {body:?}");
        }
        None => tracing::info!("{prefix}: {parts:#?}\nbody: {body:?}"),
    }
}

/// The first [LOG_BODY_LENGTH_LIMIT] characters of `body`, or `None` if it is short enough.
fn truncate(body: &str) -> Option<&str> {
    body.char_indices()
        .nth(LOG_BODY_LENGTH_LIMIT)
        .map(|(end, _)| &body[..end])
}
