//! Transactions and their storage.
//!
//! This module contains:
//! - The `Transaction` model, its categories and `TransactionBuilder`
//! - The `TransactionStore` trait and its SQLite implementation

mod category;
mod core;
mod sqlite;
mod store;

pub use category::{Category, PaymentMethod, TransactionKind};
pub use core::{MAX_DESCRIPTION_LENGTH, ReceiptProvenance, Transaction, TransactionBuilder};
pub use sqlite::{SQLiteTransactionStore, create_receipt_table, create_transaction_table};
pub use store::TransactionStore;
