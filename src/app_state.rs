//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{
    Error,
    db::initialize,
    pagination::PaginationConfig,
    receipt::{Extractor, ReceiptStorage, UploadPolicy},
    transaction::SQLiteTransactionStore,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The store for transactions, which owns the database connection.
    pub transaction_store: SQLiteTransactionStore,

    /// The directory uploaded receipts are written to.
    pub storage: ReceiptStorage,

    /// Reads the purchase data from stored receipts.
    pub extractor: Arc<dyn Extractor>,

    /// The rules uploaded receipts must follow.
    pub upload_policy: UploadPolicy,

    /// The config that controls how to display pages of data.
    pub pagination_config: PaginationConfig,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        storage: ReceiptStorage,
        extractor: Arc<dyn Extractor>,
        upload_policy: UploadPolicy,
        pagination_config: PaginationConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            transaction_store: SQLiteTransactionStore::new(connection),
            storage,
            extractor,
            upload_policy,
            pagination_config,
        })
    }
}
