//! The closed vocabularies used by transactions: kind, category and payment method.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money that was earned.
    Income,
    /// Money that was spent.
    Expense,
}

impl TransactionKind {
    /// The name used in the database and the JSON API.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(format!("unknown transaction kind '{other}'")),
        }
    }
}

/// What a transaction was for.
///
/// Each category belongs to exactly one [TransactionKind].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Category {
    // Expenses
    Food,
    Groceries,
    Transportation,
    Housing,
    Utilities,
    Healthcare,
    Entertainment,
    Shopping,
    Education,
    Travel,
    PersonalCare,
    Insurance,
    Subscriptions,
    OtherExpenses,
    // Income
    Salary,
    Freelance,
    Investments,
    Business,
    Rental,
    Gifts,
    Refunds,
    OtherIncome,
}

impl Category {
    /// Every category, expenses first.
    pub const ALL: [Category; 22] = [
        Category::Food,
        Category::Groceries,
        Category::Transportation,
        Category::Housing,
        Category::Utilities,
        Category::Healthcare,
        Category::Entertainment,
        Category::Shopping,
        Category::Education,
        Category::Travel,
        Category::PersonalCare,
        Category::Insurance,
        Category::Subscriptions,
        Category::OtherExpenses,
        Category::Salary,
        Category::Freelance,
        Category::Investments,
        Category::Business,
        Category::Rental,
        Category::Gifts,
        Category::Refunds,
        Category::OtherIncome,
    ];

    /// The kind of transaction this category may be used with.
    pub fn kind(&self) -> TransactionKind {
        match self {
            Category::Salary
            | Category::Freelance
            | Category::Investments
            | Category::Business
            | Category::Rental
            | Category::Gifts
            | Category::Refunds
            | Category::OtherIncome => TransactionKind::Income,
            _ => TransactionKind::Expense,
        }
    }

    /// The name used in the database and the JSON API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Groceries => "groceries",
            Category::Transportation => "transportation",
            Category::Housing => "housing",
            Category::Utilities => "utilities",
            Category::Healthcare => "healthcare",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::Education => "education",
            Category::Travel => "travel",
            Category::PersonalCare => "personal_care",
            Category::Insurance => "insurance",
            Category::Subscriptions => "subscriptions",
            Category::OtherExpenses => "other_expenses",
            Category::Salary => "salary",
            Category::Freelance => "freelance",
            Category::Investments => "investments",
            Category::Business => "business",
            Category::Rental => "rental",
            Category::Gifts => "gifts",
            Category::Refunds => "refunds",
            Category::OtherIncome => "other_income",
        }
    }

    /// Resolve a free-text label to an expense category.
    ///
    /// Matching ignores surrounding whitespace and letter case. Labels that
    /// are missing, unknown, or name an income category resolve to
    /// [Category::OtherExpenses].
    pub fn resolve_expense(label: Option<&str>) -> Category {
        label
            .and_then(|label| label.trim().to_lowercase().parse::<Category>().ok())
            .filter(|category| category.kind() == TransactionKind::Expense)
            .unwrap_or(Category::OtherExpenses)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// How an expense was paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    DigitalWallet,
    Other,
}

impl PaymentMethod {
    /// The name used in the database and the JSON API.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::DigitalWallet => "digital_wallet",
            PaymentMethod::Other => "other",
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "digital_wallet" => Ok(PaymentMethod::DigitalWallet),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}
