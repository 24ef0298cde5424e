//! Runs one receipt through the whole pipeline: store the upload, extract the
//! purchase data, normalize it and save the transaction.
//!
//! The uploaded file is removed if any step after the upload fails, or if the
//! ingestion is cancelled before the transaction is saved.

use std::{fmt::Display, io::ErrorKind, path::PathBuf};

use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;

use crate::{
    Error,
    receipt::{
        extraction::ExtractionResult,
        extractor::Extractor,
        normalize::normalize,
        upload::{IncomingFile, RECEIPT_FIELD, ReceiptStorage, UploadedFile},
    },
    response::ErrorBody,
    transaction::{Transaction, TransactionStore},
    user::UserID,
};

/// The steps of an ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    /// The file has been received but not written to disk.
    Received,
    /// The file has been written to the receipt directory.
    Uploaded,
    /// The extraction tool is running.
    Extracting,
    /// The extraction tool produced a usable result.
    Extracted,
    /// The extraction result has been turned into a transaction.
    Normalized,
    /// The transaction has been saved.
    Persisted,
}

impl Display for IngestionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            IngestionStage::Received => "received",
            IngestionStage::Uploaded => "uploaded",
            IngestionStage::Extracting => "extracting",
            IngestionStage::Extracted => "extracted",
            IngestionStage::Normalized => "normalized",
            IngestionStage::Persisted => "persisted",
        };

        f.write_str(stage)
    }
}

/// The outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedReceipt {
    /// The saved transaction.
    pub transaction: Transaction,
    /// The data read from the receipt.
    pub extracted: ExtractionResult,
    /// The receipt file, kept at its upload path.
    pub file: UploadedFile,
}

/// The outcome of a failed ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionFailure {
    /// The error that stopped the ingestion.
    pub error: Error,
    /// The last stage that was reached before the error.
    pub failed_during: IngestionStage,
    /// Whether the uploaded file was removed, `None` if no file was written.
    pub file_removed: Option<bool>,
}

impl IntoResponse for IngestionFailure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if status.is_server_error() {
            tracing::error!(
                "Receipt ingestion failed while {}: {}",
                self.failed_during,
                self.error
            );
        } else {
            tracing::debug!(
                "Receipt ingestion rejected while {}: {}",
                self.failed_during,
                self.error
            );
        }

        let mut message = self.error.message();

        if self.file_removed == Some(true) {
            message.push_str(" The uploaded receipt was removed.");
        }

        ErrorBody::new(message, self.error.diagnostic()).into_response_with(status)
    }
}

/// Create an expense transaction for `user_id` from the receipt in `incoming`.
///
/// # Errors
/// Returns an [IngestionFailure] holding the error of the step that failed:
/// - [Error::StorageError] if the file could not be written,
/// - any error returned by `extractor`,
/// - [Error::PersistenceValidationFailed] if the store rejected the transaction,
/// - or [Error::PersistenceError] for any other store failure.
pub async fn ingest_receipt<E, S>(
    incoming: IncomingFile,
    user_id: UserID,
    storage: &ReceiptStorage,
    extractor: &E,
    store: &S,
) -> Result<IngestedReceipt, IngestionFailure>
where
    E: Extractor + ?Sized,
    S: TransactionStore,
{
    let file = storage
        .store(incoming, OffsetDateTime::now_utc(), RECEIPT_FIELD)
        .await
        .map_err(|error| IngestionFailure {
            error,
            failed_during: IngestionStage::Received,
            file_removed: None,
        })?;
    let mut guard = RemoveOnDrop::new(file.path.clone());
    log_stage(&file, IngestionStage::Uploaded);

    log_stage(&file, IngestionStage::Extracting);
    let extracted = match extractor.extract(&file.path).await {
        Ok(extracted) => extracted,
        Err(error) => return Err(guard.discard(error, IngestionStage::Extracting).await),
    };
    log_stage(&file, IngestionStage::Extracted);

    let builder = normalize(&extracted, &file, user_id, OffsetDateTime::now_utc());
    log_stage(&file, IngestionStage::Normalized);

    let transaction = match store.create(builder) {
        Ok(transaction) => transaction,
        Err(error) => {
            let error = match error {
                Error::PersistenceValidationFailed(_) | Error::PersistenceError(_) => error,
                other => Error::PersistenceError(other.to_string()),
            };

            return Err(guard.discard(error, IngestionStage::Normalized).await);
        }
    };
    guard.disarm();
    log_stage(&file, IngestionStage::Persisted);

    tracing::info!(
        "Created transaction {} for user {} from receipt {}",
        transaction.id,
        user_id,
        file.filename
    );

    Ok(IngestedReceipt {
        transaction,
        extracted,
        file,
    })
}

fn log_stage(file: &UploadedFile, stage: IngestionStage) {
    tracing::debug!("Receipt {} {stage}", file.filename);
}

/// Removes the uploaded file when dropped, unless disarmed.
///
/// Covers ingestions that are cancelled part way through, e.g. when the
/// client disconnects while the extraction tool is running.
#[derive(Debug)]
struct RemoveOnDrop {
    path: Option<PathBuf>,
}

impl RemoveOnDrop {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Keep the file.
    fn disarm(&mut self) {
        self.path = None;
    }

    /// Remove the file and build the failure for `error`.
    ///
    /// A file that cannot be removed is logged and left behind.
    async fn discard(mut self, error: Error, failed_during: IngestionStage) -> IngestionFailure {
        let removed = match self.path.take() {
            Some(path) => {
                tracing::debug!(
                    "Receipt {} failed while {failed_during}: {error}",
                    path.display()
                );

                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        tracing::debug!("Removed receipt {}", path.display());
                        true
                    }
                    Err(io_error) if io_error.kind() == ErrorKind::NotFound => true,
                    Err(io_error) => {
                        tracing::warn!("Could not remove receipt {}: {io_error}", path.display());
                        false
                    }
                }
            }
            None => true,
        };

        IngestionFailure {
            error,
            failed_during,
            file_removed: Some(removed),
        }
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed receipt {} of cancelled upload", path.display()),
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!("Could not remove receipt {}: {error}", path.display())
            }
        }
    }
}
