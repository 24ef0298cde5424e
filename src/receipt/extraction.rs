//! The payload produced by the extraction tool and the rules for accepting it.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Everything the extraction tool produced in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// The exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Everything the process wrote to standard output.
    pub stdout: String,
    /// Everything the process wrote to standard error.
    pub stderr: String,
}

/// The structured purchase data read from a receipt.
///
/// Keys that are not listed here are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// The receipt total.
    pub total: Option<Amount>,
    /// The amount that was paid, used when there is no total.
    #[serde(alias = "amount_paid")]
    pub amount_paid: Option<Amount>,
    /// The store or business named on the receipt.
    pub merchant: Option<String>,
    /// The purchase date as printed or inferred by the tool.
    pub date: Option<String>,
    /// The tool's guess at the expense category.
    pub category: Option<String>,
    /// The purchased items in receipt order.
    pub items: Option<Vec<LineItem>>,
    /// How the tool arrived at the category.
    #[serde(alias = "category_source")]
    pub category_source: Option<String>,
}

impl ExtractionResult {
    /// The amount spent: the total if it is usable, otherwise the amount paid.
    ///
    /// Returns `None` if neither is a finite, non-negative number.
    pub fn amount(&self) -> Option<f64> {
        self.total
            .as_ref()
            .and_then(Amount::value)
            .or_else(|| self.amount_paid.as_ref().and_then(Amount::value))
    }

    /// The item descriptions, skipping blank entries.
    pub fn item_descriptions(&self) -> Vec<String> {
        self.items
            .iter()
            .flatten()
            .map(LineItem::description)
            .filter(|description| !description.is_empty())
            .collect()
    }
}

/// A monetary amount as emitted by the tool, either a JSON number or a string
/// such as "$1,234.50".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    /// A JSON number.
    Number(f64),
    /// A number written as text.
    Text(String),
}

impl Amount {
    /// The amount as a finite, non-negative number.
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Amount::Number(number) => *number,
            Amount::Text(text) => parse_money(text)?,
        };

        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Parse text such as "$1,234.50", "5 €" or "-$5" with the sign kept.
fn parse_money(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let digits = unsigned
        .trim()
        .trim_matches(CURRENCY_SYMBOLS)
        .trim()
        .replace(',', "");
    if digits.starts_with(['+', '-']) {
        return None;
    }

    let value = digits.parse::<f64>().ok()?;

    Some(if negative { -value } else { value })
}

/// One purchased item, either a plain description or an object describing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineItem {
    /// A plain description, e.g. "Flat white".
    Text(String),
    /// An item with optional price and quantity.
    Detailed {
        /// What was bought.
        #[serde(alias = "name")]
        description: String,
        /// The price of the line.
        #[serde(default)]
        price: Option<Amount>,
        /// How many were bought.
        #[serde(default)]
        quantity: Option<f64>,
    },
}

impl LineItem {
    /// The trimmed description of the item.
    pub fn description(&self) -> String {
        match self {
            LineItem::Text(text) => text.trim().to_owned(),
            LineItem::Detailed { description, .. } => description.trim().to_owned(),
        }
    }
}

/// Interpret the output of one run of the extraction tool.
///
/// # Errors
/// This function will return a:
/// - [Error::ExtractionFailed] if the tool did not exit with status 0,
/// - [Error::ExtractionOutputMalformed] if standard output is empty or not an extraction payload,
/// - or [Error::ExtractionIncomplete] if the payload has no usable total or amount paid.
pub fn parse_extraction_output(output: ProcessOutput) -> Result<ExtractionResult, Error> {
    if output.exit_code != Some(0) {
        return Err(Error::ExtractionFailed {
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }

    let stdout = output.stdout.trim();

    if stdout.is_empty() {
        return Err(Error::ExtractionOutputMalformed(
            "the extraction tool produced no output".to_owned(),
        ));
    }

    let result: ExtractionResult = serde_json::from_str(stdout)
        .map_err(|error| Error::ExtractionOutputMalformed(error.to_string()))?;

    if result.amount().is_none() {
        tracing::debug!("Extraction output has no usable amount: {stdout}");
        return Err(Error::ExtractionIncomplete);
    }

    Ok(result)
}
