//! Receipt Ledger is a web service that turns photos and scans of receipts
//! into expense transactions.
//!
//! This library provides a JSON API for uploading a receipt, running it
//! through an external extraction tool, and browsing the transactions that
//! were created from receipts.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod database_id;
mod db;
pub mod endpoints;
mod logging;
mod pagination;
pub mod receipt;
mod response;
mod routing;
#[cfg(test)]
mod test_utils;
mod transaction;
mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::{PageRequest, Pagination, PaginationConfig};
pub use receipt::{
    CommandExtractor, ExtractionResult, Extractor, ProcessOutput, ReceiptStorage, UploadPolicy,
};
pub use routing::build_router;
pub use transaction::{
    Category, PaymentMethod, ReceiptProvenance, SQLiteTransactionStore, Transaction,
    TransactionBuilder, TransactionKind, TransactionStore,
};
pub use user::UserID;

use crate::response::ErrorBody;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user ID was missing or is not a positive integer.
    #[error("\"{0}\" is not a valid user ID")]
    InvalidUserIdentifier(String),

    /// The page number or page size of a paginated request was less than one.
    #[error("page and limit must both be at least 1")]
    InvalidPagination,

    /// The uploaded file has a content type that is not accepted for the form
    /// field it was sent under.
    #[error("the content type \"{0}\" is not allowed")]
    InvalidFileType(String),

    /// The uploaded file is larger than the configured ceiling.
    #[error("the uploaded file is larger than the limit of {limit} bytes")]
    FileTooLarge {
        /// The maximum number of bytes allowed.
        limit: u64,
    },

    /// More than one file was sent under the receipt field.
    #[error("only one receipt may be uploaded per request")]
    TooManyFiles,

    /// The request did not contain a receipt file.
    #[error("the request did not contain a receipt file")]
    MissingFile,

    /// The multipart form could not be read.
    #[error("could not parse multipart form: {0}")]
    MultipartError(String),

    /// The extraction tool could not be started, e.g., the executable is
    /// missing or not executable.
    #[error("could not launch the extraction tool: {0}")]
    ExtractionLaunchFailed(String),

    /// The extraction tool ran but exited unsuccessfully.
    ///
    /// `exit_code` is `None` if the process was terminated by a signal.
    #[error("the extraction tool exited with status {exit_code:?}: {stderr}")]
    ExtractionFailed {
        /// The exit code of the extraction process.
        exit_code: Option<i32>,
        /// Everything the process wrote to standard error.
        stderr: String,
    },

    /// The extraction tool exited successfully but its standard output was
    /// not a valid extraction payload.
    #[error("the extraction output could not be parsed: {0}")]
    ExtractionOutputMalformed(String),

    /// The extraction output did not contain a usable total amount.
    #[error("the amount could not be determined from the receipt")]
    ExtractionIncomplete,

    /// The extraction tool did not finish within the configured time limit
    /// and was killed.
    #[error("the extraction tool did not finish within {0:?}")]
    ExtractionTimeout(Duration),

    /// The transaction store rejected the transaction because it breaks one
    /// of the transaction schema rules.
    #[error("the transaction is invalid: {0}")]
    PersistenceValidationFailed(String),

    /// An unexpected error occurred in the transaction store.
    #[error("an unexpected store error occurred: {0}")]
    PersistenceError(String),

    /// The uploaded file could not be written to, or read from, disk.
    #[error("could not store the uploaded file: {0}")]
    StorageError(String),

    /// The requested resource was not found.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, desc)
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK =>
            {
                Error::PersistenceValidationFailed(
                    desc.unwrap_or_else(|| "a CHECK constraint failed".to_owned()),
                )
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::PersistenceError(error.to_string())
            }
        }
    }
}

impl Error {
    /// The HTTP status code that best describes the error.
    ///
    /// Problems with the request or the receipt's content are 400-class,
    /// problems with the extraction tool, the disk or the store are 500-class.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidUserIdentifier(_)
            | Error::InvalidPagination
            | Error::InvalidFileType(_)
            | Error::FileTooLarge { .. }
            | Error::TooManyFiles
            | Error::MissingFile
            | Error::MultipartError(_)
            | Error::ExtractionIncomplete
            | Error::PersistenceValidationFailed(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::ExtractionLaunchFailed(_)
            | Error::ExtractionFailed { .. }
            | Error::ExtractionOutputMalformed(_)
            | Error::ExtractionTimeout(_)
            | Error::PersistenceError(_)
            | Error::StorageError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A message that is safe to show to the client.
    pub fn message(&self) -> String {
        match self {
            Error::InvalidUserIdentifier(_) => "Invalid user ID.".to_owned(),
            Error::InvalidPagination => "Page and limit must be positive integers.".to_owned(),
            Error::InvalidFileType(content_type) => format!(
                "Files of type \"{content_type}\" are not accepted. \
                Upload a JPEG, PNG or WebP image, or a PDF document."
            ),
            Error::FileTooLarge { limit } => {
                format!("The receipt must be no larger than {limit} bytes.")
            }
            Error::TooManyFiles => "Only one receipt can be uploaded at a time.".to_owned(),
            Error::MissingFile => "No receipt file was uploaded.".to_owned(),
            Error::MultipartError(_) => "The upload form could not be read.".to_owned(),
            Error::ExtractionLaunchFailed(_) => {
                "The receipt processor could not be started.".to_owned()
            }
            Error::ExtractionFailed { .. } => "The receipt could not be processed.".to_owned(),
            Error::ExtractionOutputMalformed(_) => {
                "The receipt processor returned data that could not be understood.".to_owned()
            }
            Error::ExtractionIncomplete => {
                "Could not determine the total amount from the receipt.".to_owned()
            }
            Error::ExtractionTimeout(_) => "Processing the receipt took too long.".to_owned(),
            Error::PersistenceValidationFailed(_) => {
                "The transaction created from the receipt is invalid.".to_owned()
            }
            Error::PersistenceError(_) | Error::DatabaseLockError => {
                "The transaction could not be saved.".to_owned()
            }
            Error::StorageError(_) => "The receipt could not be stored.".to_owned(),
            Error::NotFound => "Not found.".to_owned(),
        }
    }

    /// Detail for operators, only included in responses for failures of the
    /// extraction tool, the disk or the store.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Error::ExtractionLaunchFailed(detail)
            | Error::ExtractionOutputMalformed(detail)
            | Error::PersistenceValidationFailed(detail)
            | Error::PersistenceError(detail)
            | Error::StorageError(detail) => Some(detail.clone()),
            Error::ExtractionFailed { exit_code, stderr } => Some(match exit_code {
                Some(code) => format!("exit code {code}: {}", stderr.trim()),
                None => format!("terminated by signal: {}", stderr.trim()),
            }),
            Error::ExtractionTimeout(duration) => {
                Some(format!("timed out after {}s", duration.as_secs_f64()))
            }
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("An unexpected error occurred: {}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        ErrorBody::new(self.message(), self.diagnostic()).into_response_with(status)
    }
}
