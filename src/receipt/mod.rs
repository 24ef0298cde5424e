//! Receipt ingestion and history.
//!
//! This module contains:
//! - The upload policy and the storage of uploaded receipt files
//! - The `Extractor` trait and the `CommandExtractor` that runs the external extraction tool
//! - Normalization of extracted data into expense transactions
//! - The ingestion flow that ties these together and cleans up after failures
//! - The route handlers for uploading receipts and browsing receipt history

mod extraction;
mod extractor;
mod history;
mod ingest;
mod normalize;
mod upload;
mod upload_endpoint;

pub use extraction::{
    Amount, ExtractionResult, LineItem, ProcessOutput, parse_extraction_output,
};
pub use extractor::{CommandExtractor, DEFAULT_TIMEOUT, Extractor};
pub use history::{
    HistoryQuery, ReceiptHistory, ReceiptHistoryState, find_receipt, get_receipt,
    get_receipt_history, receipt_history,
};
pub use ingest::{IngestedReceipt, IngestionFailure, IngestionStage, ingest_receipt};
pub use normalize::normalize;
pub use upload::{
    DEFAULT_MAX_UPLOAD_BYTES, IncomingFile, ReceiptStorage, UploadPolicy, UploadedFile,
    read_receipt_form,
};
pub use upload_endpoint::{ReceiptUploadState, upload_receipt};
