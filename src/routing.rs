//! Application router configuration.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{
    AppState, endpoints,
    receipt::{get_receipt, get_receipt_history, upload_receipt},
    response::get_404_not_found,
};

/// Room for the multipart framing around a receipt that is exactly at the size limit.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .upload_policy
        .max_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route(
            endpoints::RECEIPT_UPLOAD,
            post(upload_receipt).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(endpoints::RECEIPT_HISTORY, get(get_receipt_history))
        .route(endpoints::RECEIPT, get(get_receipt))
        .fallback(get_404_not_found)
        .with_state(state)
}
