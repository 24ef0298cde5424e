//! Implements a SQLite backed transaction store.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Row, types::Type};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    pagination::PageRequest,
    transaction::{ReceiptProvenance, Transaction, TransactionBuilder, TransactionStore},
    user::UserID,
};

const SELECT_TRANSACTION: &str = "SELECT t.id, t.user_id, t.kind, t.category, t.amount, \
    t.description, t.date, t.payment_method, t.created_at, r.merchant, r.items, \
    r.category_source, r.original_filename, r.stored_filename, r.file_size, r.file_hash, \
    r.processed_at, r.file_path \
    FROM \"transaction\" t";

/// Stores transactions and their receipt provenance in a SQLite database.
///
/// The tables must be set up with [crate::initialize_db] first.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    connection: Arc<Mutex<Connection>>,
}

impl SQLiteTransactionStore {
    /// Create a new store for the SQLite `connection`.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self { connection }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.connection.lock().map_err(|error| {
            tracing::error!("could not acquire database lock: {error}");
            Error::DatabaseLockError
        })
    }
}

impl TransactionStore for SQLiteTransactionStore {
    /// Create a new transaction in the database.
    ///
    /// The transaction row and its receipt row are written in one SQL
    /// transaction.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::PersistenceValidationFailed] if `builder` breaks a transaction rule,
    /// - [Error::PersistenceError] if there is some other SQL error,
    /// - or [Error::DatabaseLockError] if the connection lock is poisoned.
    fn create(&self, builder: TransactionBuilder) -> Result<Transaction, Error> {
        builder.validate()?;

        let connection = self.lock()?;
        let created_at = OffsetDateTime::now_utc();
        let tx = connection.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO \"transaction\"
                (user_id, kind, category, amount, description, date, payment_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                builder.user_id.as_i64(),
                builder.kind.as_str(),
                builder.category.as_str(),
                builder.amount,
                &builder.description,
                builder.date,
                builder.payment_method.map(|method| method.as_str()),
                created_at,
            ),
        )?;
        let id = tx.last_insert_rowid();

        if let Some(receipt) = &builder.receipt {
            let items = serde_json::to_string(&receipt.items)
                .map_err(|error| Error::PersistenceError(error.to_string()))?;

            tx.execute(
                "INSERT INTO receipt
                    (transaction_id, merchant, items, category_source, original_filename,
                     stored_filename, file_size, file_hash, processed_at, file_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                (
                    id,
                    &receipt.merchant,
                    items,
                    &receipt.category_source,
                    &receipt.original_filename,
                    &receipt.stored_filename,
                    receipt.file_size as i64,
                    &receipt.file_hash,
                    receipt.processed_at,
                    &receipt.file_path,
                ),
            )?;
        }

        tx.commit()?;

        Ok(Transaction {
            id,
            user_id: builder.user_id,
            kind: builder.kind,
            category: builder.category,
            amount: builder.amount,
            description: builder.description,
            date: builder.date,
            payment_method: builder.payment_method,
            receipt: builder.receipt,
            created_at,
        })
    }

    /// Retrieve a transaction in the database by its `id`.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::NotFound] if `id` does not refer to a valid transaction,
    /// - or [Error::PersistenceError] there is some other SQL error.
    fn get(&self, id: TransactionId) -> Result<Transaction, Error> {
        let transaction = self
            .lock()?
            .prepare(&format!(
                "{SELECT_TRANSACTION} LEFT JOIN receipt r ON r.transaction_id = t.id WHERE t.id = :id"
            ))?
            .query_one(&[(":id", &id)], map_transaction_row)?;

        Ok(transaction)
    }

    fn count_receipts(&self, user_id: UserID) -> Result<u64, Error> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(t.id) FROM \"transaction\" t
             INNER JOIN receipt r ON r.transaction_id = t.id
             WHERE t.user_id = ?1",
            [user_id.as_i64()],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    fn get_receipts(&self, user_id: UserID, page: PageRequest) -> Result<Vec<Transaction>, Error> {
        let Some(offset) = page.offset() else {
            return Ok(Vec::new());
        };

        self.lock()?
            .prepare(&format!(
                "{SELECT_TRANSACTION} INNER JOIN receipt r ON r.transaction_id = t.id
                 WHERE t.user_id = ?1
                 ORDER BY t.created_at DESC, t.id DESC
                 LIMIT ?2 OFFSET ?3"
            ))?
            .query_map(
                (
                    user_id.as_i64(),
                    i64::try_from(page.limit).unwrap_or(i64::MAX),
                    offset,
                ),
                map_transaction_row,
            )?
            .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
            .collect()
    }
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                category TEXT NOT NULL,
                amount REAL NOT NULL CHECK (amount > 0),
                description TEXT,
                date TEXT NOT NULL,
                payment_method TEXT,
                created_at TEXT NOT NULL
                )",
        (),
    )?;

    // Ensure the sequence starts at 1
    connection.execute(
        "INSERT OR IGNORE INTO sqlite_sequence (name, seq) VALUES ('transaction', 0)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_user_created
         ON \"transaction\"(user_id, created_at);",
        (),
    )?;

    Ok(())
}

/// Create the table holding the receipt provenance of transactions.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_receipt_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS receipt (
                transaction_id INTEGER PRIMARY KEY,
                merchant TEXT,
                items TEXT NOT NULL,
                category_source TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                stored_filename TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_hash TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                file_path TEXT NOT NULL,
                FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON DELETE CASCADE
                )",
        (),
    )?;

    Ok(())
}

fn parse_column<T>(row: &Row, index: usize) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(index)?;

    text.parse()
        .map_err(|error: String| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.into()))
}

/// Map a database row to a Transaction.
///
/// Expects the columns selected by `SELECT_TRANSACTION`, the receipt columns
/// are `NULL` for transactions that were not created from a receipt.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let payment_method: Option<String> = row.get(7)?;
    let payment_method = payment_method
        .map(|method| {
            method.parse().map_err(|error: String| {
                rusqlite::Error::FromSqlConversionFailure(7, Type::Text, error.into())
            })
        })
        .transpose()?;

    let file_path: Option<String> = row.get(17)?;
    let receipt = match file_path {
        Some(file_path) => {
            let items: String = row.get(10)?;
            let items = serde_json::from_str(&items).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(error))
            })?;
            let file_size: i64 = row.get(14)?;

            Some(ReceiptProvenance {
                merchant: row.get(9)?,
                items,
                category_source: row.get(11)?,
                original_filename: row.get(12)?,
                stored_filename: row.get(13)?,
                file_size: file_size as u64,
                file_hash: row.get(15)?,
                processed_at: row.get(16)?,
                file_path,
            })
        }
        None => None,
    };

    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        kind: parse_column(row, 2)?,
        category: parse_column(row, 3)?,
        amount: row.get(4)?,
        description: row.get(5)?,
        date: row.get(6)?,
        payment_method,
        created_at: row.get(8)?,
        receipt,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;
    use time::{OffsetDateTime, macros::date};

    use crate::{
        Error,
        db::initialize,
        pagination::PageRequest,
        transaction::{
            Category, PaymentMethod, ReceiptProvenance, SQLiteTransactionStore, Transaction,
            TransactionBuilder, TransactionKind, TransactionStore,
        },
        user::UserID,
    };

    fn get_test_store() -> SQLiteTransactionStore {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        SQLiteTransactionStore::new(Arc::new(Mutex::new(conn)))
    }

    fn receipt(name: &str) -> ReceiptProvenance {
        ReceiptProvenance {
            merchant: Some("Cafe X".to_owned()),
            items: vec!["Flat white".to_owned(), "Croissant".to_owned()],
            category_source: "model".to_owned(),
            original_filename: "IMG_0001.jpg".to_owned(),
            stored_filename: name.to_owned(),
            file_size: 1024,
            file_hash: "ab".repeat(32),
            processed_at: OffsetDateTime::UNIX_EPOCH,
            file_path: format!("/tmp/{name}"),
        }
    }

    fn receipt_expense(user_id: UserID, amount: f64) -> TransactionBuilder {
        Transaction::build(
            user_id,
            TransactionKind::Expense,
            Category::Food,
            amount,
            date!(2024 - 03 - 01),
        )
        .payment_method(Some(PaymentMethod::Other))
        .description("Receipt from Cafe X")
        .receipt(receipt("receipt-1-abc.jpg"))
    }

    #[test]
    fn create_and_get_round_trip_receipt() {
        let store = get_test_store();

        let created = store
            .create(receipt_expense(UserID::new(1), 42.5))
            .expect("Could not create transaction");
        let got = store.get(created.id).expect("Could not get transaction");

        assert_eq!(created, got);
        assert_eq!(got.receipt.unwrap().items.len(), 2);
    }

    #[test]
    fn get_transaction_without_receipt() {
        let store = get_test_store();
        let created = store
            .create(
                Transaction::build(
                    UserID::new(1),
                    TransactionKind::Income,
                    Category::Salary,
                    1000.0,
                    date!(2024 - 03 - 01),
                )
                .description("Wages"),
            )
            .unwrap();

        let got = store.get(created.id).unwrap();

        assert_eq!(got.receipt, None);
        assert_eq!(got.payment_method, None);
    }

    #[test]
    fn get_missing_transaction_is_not_found() {
        let store = get_test_store();

        assert_eq!(store.get(999), Err(Error::NotFound));
    }

    #[test]
    fn invalid_builder_saves_nothing() {
        let store = get_test_store();
        let user_id = UserID::new(1);

        let result = store.create(receipt_expense(user_id, 0.0));

        assert!(matches!(result, Err(Error::PersistenceValidationFailed(_))));
        assert_eq!(store.count_receipts(user_id), Ok(0));
    }

    #[test]
    fn create_without_tables_is_persistence_error() {
        let conn = Connection::open_in_memory().unwrap();
        let store = SQLiteTransactionStore::new(Arc::new(Mutex::new(conn)));

        let result = store.create(receipt_expense(UserID::new(1), 10.0));

        assert!(matches!(result, Err(Error::PersistenceError(_))));
    }

    #[test]
    fn ids_are_distinct() {
        let store = get_test_store();

        let first = store.create(receipt_expense(UserID::new(1), 5.0)).unwrap();
        let second = store.create(receipt_expense(UserID::new(1), 5.0)).unwrap();

        assert_ne!(first.id, second.id);
    }

    #[test]
    fn receipts_are_paged_newest_first() {
        let store = get_test_store();
        let user_id = UserID::new(1);
        for i in 1..=15 {
            store.create(receipt_expense(user_id, i as f64)).unwrap();
        }

        let page_one = store
            .get_receipts(user_id, PageRequest { page: 1, limit: 10 })
            .unwrap();
        let page_two = store
            .get_receipts(user_id, PageRequest { page: 2, limit: 10 })
            .unwrap();

        assert_eq!(page_one.len(), 10);
        assert_eq!(page_two.len(), 5);
        assert_eq!(page_one[0].amount, 15.0);
        assert_eq!(page_two[4].amount, 1.0);
    }

    #[test]
    fn receipt_queries_only_see_the_users_receipts() {
        let store = get_test_store();
        let user_id = UserID::new(1);
        store.create(receipt_expense(user_id, 5.0)).unwrap();
        store
            .create(receipt_expense(UserID::new(2), 6.0))
            .unwrap();
        store
            .create(
                Transaction::build(
                    user_id,
                    TransactionKind::Expense,
                    Category::Housing,
                    700.0,
                    date!(2024 - 03 - 01),
                )
                .payment_method(Some(PaymentMethod::BankTransfer)),
            )
            .unwrap();

        let got = store
            .get_receipts(user_id, PageRequest { page: 1, limit: 10 })
            .unwrap();

        assert_eq!(store.count_receipts(user_id), Ok(1));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].amount, 5.0);
    }

    #[test]
    fn page_beyond_sql_offset_range_is_empty() {
        let store = get_test_store();
        let user_id = UserID::new(1);
        for i in 1..=15 {
            store.create(receipt_expense(user_id, i as f64)).unwrap();
        }

        let got = store
            .get_receipts(
                user_id,
                PageRequest {
                    page: 1_000_000_000_000_000_000,
                    limit: 10,
                },
            )
            .unwrap();

        assert!(got.is_empty());
    }
}
