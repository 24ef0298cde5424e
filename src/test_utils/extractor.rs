use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    Error,
    receipt::{Amount, ExtractionResult, Extractor},
};

/// An extractor that returns the same result for every receipt and records
/// which receipts it was given.
#[derive(Debug)]
pub(crate) struct CannedExtractor {
    result: Result<ExtractionResult, Error>,
    seen: Mutex<Vec<PathBuf>>,
}

impl CannedExtractor {
    pub(crate) fn returning(result: Result<ExtractionResult, Error>) -> Self {
        Self {
            result,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A successful extraction of a $42.50 coffee shop receipt.
    pub(crate) fn cafe() -> Self {
        Self::returning(Ok(ExtractionResult {
            total: Some(Amount::Number(42.5)),
            merchant: Some("Cafe X".to_owned()),
            date: Some("2024-03-01".to_owned()),
            category: Some("food".to_owned()),
            ..Default::default()
        }))
    }

    /// The receipts this extractor was called with, in order.
    pub(crate) fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for CannedExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, Error> {
        assert!(path.exists(), "extractor called with missing file {path:?}");
        self.seen.lock().unwrap().push(path.to_owned());
        self.result.clone()
    }
}

/// An extractor that never finishes, for cancelling ingestion part way through.
#[derive(Debug, Default)]
pub(crate) struct PendingExtractor {
    seen: Mutex<Vec<PathBuf>>,
}

impl PendingExtractor {
    pub(crate) fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for PendingExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractionResult, Error> {
        self.seen.lock().unwrap().push(path.to_owned());
        std::future::pending().await
    }
}
