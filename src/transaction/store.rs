//! Defines the transaction store trait.

use crate::{
    Error, database_id::TransactionId, pagination::PageRequest, transaction::Transaction,
    user::UserID,
};

use super::TransactionBuilder;

/// Handles the creation and retrieval of transactions.
///
/// A single call to [TransactionStore::create] is atomic: either the whole
/// transaction, including its receipt provenance, is saved or nothing is.
pub trait TransactionStore {
    /// Validate and save a new transaction.
    ///
    /// # Errors
    /// Implementers should return [Error::PersistenceValidationFailed] when
    /// the builder breaks a transaction rule and [Error::PersistenceError]
    /// for any other failure.
    fn create(&self, builder: TransactionBuilder) -> Result<Transaction, Error>;

    /// Retrieve a transaction by its ID.
    ///
    /// # Errors
    /// Implementers should return [Error::NotFound] if there is no
    /// transaction with `id`.
    fn get(&self, id: TransactionId) -> Result<Transaction, Error>;

    /// Count the transactions owned by `user_id` that were created from a receipt.
    fn count_receipts(&self, user_id: UserID) -> Result<u64, Error>;

    /// Retrieve one page of the transactions owned by `user_id` that were
    /// created from a receipt, newest first.
    fn get_receipts(&self, user_id: UserID, page: PageRequest) -> Result<Vec<Transaction>, Error>;
}
