//! Defines the core data models for transactions.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{Error, database_id::TransactionId, user::UserID};

use super::category::{Category, PaymentMethod, TransactionKind};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// The longest description a transaction may have, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build] and pass the
/// builder to a [TransactionStore](super::TransactionStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Whether money was earned or spent.
    pub kind: TransactionKind,
    /// What the money was earned or spent on.
    pub category: Category,
    /// The amount of money spent or earned, always positive.
    ///
    /// Stored at full precision, use [Transaction::display_amount] to show it.
    pub amount: f64,
    /// A text description of what the transaction was for.
    pub description: Option<String>,
    /// When the transaction happened.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// How an expense was paid. Always `None` for income.
    pub payment_method: Option<PaymentMethod>,
    /// Where the transaction came from, if it was created from a receipt.
    pub receipt: Option<ReceiptProvenance>,
    /// When the transaction was saved.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(
        user_id: UserID,
        kind: TransactionKind,
        category: Category,
        amount: f64,
        date: Date,
    ) -> TransactionBuilder {
        TransactionBuilder {
            user_id,
            kind,
            category,
            amount,
            description: None,
            date,
            payment_method: None,
            receipt: None,
        }
    }

    /// The amount rounded to cents, e.g. "42.50".
    pub fn display_amount(&self) -> String {
        format!("{:.2}", round_to_cents(self.amount))
    }
}

/// Round `amount` to two decimal places.
fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// The record of the receipt a transaction was created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptProvenance {
    /// The store or business named on the receipt.
    pub merchant: Option<String>,
    /// The purchased items, in the order they appear on the receipt.
    pub items: Vec<String>,
    /// How the extraction tool arrived at the category, e.g. "model" or
    /// "keyword". "unknown" when the tool did not say.
    pub category_source: String,
    /// The file name sent by the client.
    pub original_filename: String,
    /// The generated file name the receipt is stored under.
    pub stored_filename: String,
    /// The size of the receipt file in bytes.
    pub file_size: u64,
    /// Hex encoded SHA-256 digest of the receipt file.
    pub file_hash: String,
    /// When the receipt was processed.
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    /// The absolute path of the stored receipt file.
    pub file_path: String,
}

/// A builder for creating [Transaction] instances.
///
/// Required fields are set by [Transaction::build], the rest default to
/// `None`. Call [TransactionBuilder::validate] (the store does this for you)
/// to check the builder against the transaction rules.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionBuilder {
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Whether money was earned or spent.
    pub kind: TransactionKind,
    /// What the money was earned or spent on.
    pub category: Category,
    /// The amount of money, must be positive.
    pub amount: f64,
    /// An optional text description.
    pub description: Option<String>,
    /// When the transaction happened.
    pub date: Date,
    /// Required for expenses, forbidden for income.
    pub payment_method: Option<PaymentMethod>,
    /// Set when the transaction was created from a receipt.
    pub receipt: Option<ReceiptProvenance>,
}

impl TransactionBuilder {
    /// Set the description for the transaction.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the payment method for the transaction.
    pub fn payment_method(mut self, payment_method: Option<PaymentMethod>) -> Self {
        self.payment_method = payment_method;
        self
    }

    /// Attach the receipt the transaction was created from.
    pub fn receipt(mut self, receipt: ReceiptProvenance) -> Self {
        self.receipt = Some(receipt);
        self
    }

    /// Check the builder against the transaction rules.
    ///
    /// # Errors
    /// Returns [Error::PersistenceValidationFailed] naming the first rule
    /// that is broken.
    pub fn validate(&self) -> Result<(), Error> {
        let reject = |reason: String| Err(Error::PersistenceValidationFailed(reason));

        if !self.amount.is_finite() || self.amount <= 0.0 {
            return reject(format!(
                "amount must be a positive number, got {}",
                self.amount
            ));
        }

        if self.category.kind() != self.kind {
            return reject(format!(
                "{} is not a valid {} category",
                self.category, self.kind
            ));
        }

        match (self.kind, self.payment_method) {
            (TransactionKind::Expense, None) => {
                return reject("expenses must have a payment method".to_owned());
            }
            (TransactionKind::Income, Some(_)) => {
                return reject("income must not have a payment method".to_owned());
            }
            _ => {}
        }

        if let Some(description) = &self.description
            && description.chars().count() > MAX_DESCRIPTION_LENGTH
        {
            return reject(format!(
                "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
            ));
        }

        if self.receipt.is_some() && self.kind != TransactionKind::Expense {
            return reject("only expenses can be created from receipts".to_owned());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Error,
        transaction::{Category, PaymentMethod, Transaction, TransactionKind},
        user::UserID,
    };

    fn expense(amount: f64) -> crate::transaction::TransactionBuilder {
        Transaction::build(
            UserID::new(1),
            TransactionKind::Expense,
            Category::Food,
            amount,
            date!(2024 - 03 - 01),
        )
        .payment_method(Some(PaymentMethod::Other))
    }

    #[test]
    fn valid_expense_passes() {
        assert_eq!(expense(42.5).validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_amount() {
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(
                    expense(amount).validate(),
                    Err(Error::PersistenceValidationFailed(_))
                ),
                "amount {amount} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_category_of_other_kind() {
        let builder = Transaction::build(
            UserID::new(1),
            TransactionKind::Expense,
            Category::Salary,
            10.0,
            date!(2024 - 03 - 01),
        )
        .payment_method(Some(PaymentMethod::Cash));

        assert_eq!(
            builder.validate(),
            Err(Error::PersistenceValidationFailed(
                "salary is not a valid expense category".to_owned()
            ))
        );
    }

    #[test]
    fn expense_requires_payment_method() {
        let builder = expense(10.0).payment_method(None);

        assert_eq!(
            builder.validate(),
            Err(Error::PersistenceValidationFailed(
                "expenses must have a payment method".to_owned()
            ))
        );
    }

    #[test]
    fn income_forbids_payment_method() {
        let builder = Transaction::build(
            UserID::new(1),
            TransactionKind::Income,
            Category::Salary,
            10.0,
            date!(2024 - 03 - 01),
        )
        .payment_method(Some(PaymentMethod::BankTransfer));

        assert_eq!(
            builder.validate(),
            Err(Error::PersistenceValidationFailed(
                "income must not have a payment method".to_owned()
            ))
        );
    }

    #[test]
    fn rejects_overlong_description() {
        let builder = expense(10.0).description("x".repeat(501));

        assert!(matches!(
            builder.validate(),
            Err(Error::PersistenceValidationFailed(_))
        ));
    }

    #[test]
    fn display_amount_rounds_to_cents() {
        let transaction = Transaction {
            id: 1,
            user_id: UserID::new(1),
            kind: TransactionKind::Expense,
            category: Category::Food,
            amount: 42.499_999,
            description: None,
            date: date!(2024 - 03 - 01),
            payment_method: Some(PaymentMethod::Other),
            receipt: None,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };

        assert_eq!(transaction.display_amount(), "42.50");
    }
}
