use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use rusqlite::Connection;

use crate::{
    Error,
    database_id::TransactionId,
    db::initialize,
    pagination::PageRequest,
    transaction::{SQLiteTransactionStore, Transaction, TransactionBuilder, TransactionStore},
    user::UserID,
};

/// A store backed by a fresh in-memory database.
pub(crate) fn must_make_store() -> SQLiteTransactionStore {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();

    SQLiteTransactionStore::new(Arc::new(Mutex::new(connection)))
}

/// A store where every call fails with the same error.
#[derive(Debug)]
pub(crate) struct FailingStore(pub(crate) Error);

impl TransactionStore for FailingStore {
    fn create(&self, _builder: TransactionBuilder) -> Result<Transaction, Error> {
        Err(self.0.clone())
    }

    fn get(&self, _id: TransactionId) -> Result<Transaction, Error> {
        Err(self.0.clone())
    }

    fn count_receipts(&self, _user_id: UserID) -> Result<u64, Error> {
        Err(self.0.clone())
    }

    fn get_receipts(&self, _user_id: UserID, _page: PageRequest) -> Result<Vec<Transaction>, Error> {
        Err(self.0.clone())
    }
}

/// The files in `dir`, sorted by name.
pub(crate) fn stored_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files
}
