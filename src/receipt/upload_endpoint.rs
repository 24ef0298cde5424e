//! The endpoint for uploading a receipt and creating an expense from it.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    AppState,
    receipt::{
        extraction::ExtractionResult,
        extractor::Extractor,
        ingest::ingest_receipt,
        upload::{ReceiptStorage, UploadPolicy, UploadedFile, read_receipt_form},
    },
    response::render_json,
    transaction::{SQLiteTransactionStore, Transaction},
    user::parse_user_id,
};

/// The state needed for uploading receipts.
#[derive(Debug, Clone)]
pub struct ReceiptUploadState {
    /// The store the new transactions are saved to.
    pub transaction_store: SQLiteTransactionStore,
    /// Where uploaded receipts are written.
    pub storage: ReceiptStorage,
    /// Reads the purchase data from stored receipts.
    pub extractor: Arc<dyn Extractor>,
    /// The rules uploaded files must follow.
    pub upload_policy: UploadPolicy,
}

impl FromRef<AppState> for ReceiptUploadState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            transaction_store: state.transaction_store.clone(),
            storage: state.storage.clone(),
            extractor: state.extractor.clone(),
            upload_policy: state.upload_policy.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse<'a> {
    success: bool,
    message: &'a str,
    transaction: &'a Transaction,
    extracted_data: &'a ExtractionResult,
    receipt_file: &'a UploadedFile,
}

/// A route handler for uploading a receipt.
///
/// Expects a multipart form with the receipt file and the user ID. Responds
/// with 201 and the new transaction on success.
pub async fn upload_receipt(
    State(state): State<ReceiptUploadState>,
    mut multipart: Multipart,
) -> Response {
    let form = match read_receipt_form(&mut multipart, &state.upload_policy).await {
        Ok(form) => form,
        Err(error) => return error.into_response(),
    };

    let user_id = match parse_user_id(form.user_id.as_deref()) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    let ingested = match ingest_receipt(
        form.file,
        user_id,
        &state.storage,
        state.extractor.as_ref(),
        &state.transaction_store,
    )
    .await
    {
        Ok(ingested) => ingested,
        Err(failure) => return failure.into_response(),
    };

    render_json(
        StatusCode::CREATED,
        UploadResponse {
            success: true,
            message: "Receipt processed successfully.",
            transaction: &ingested.transaction,
            extracted_data: &ingested.extracted,
            receipt_file: &ingested.file,
        },
    )
}
