//! Turns extracted receipt data into a new expense transaction.

use time::{
    Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

use crate::{
    receipt::{extraction::ExtractionResult, upload::UploadedFile},
    transaction::{
        Category, MAX_DESCRIPTION_LENGTH, PaymentMethod, ReceiptProvenance, Transaction,
        TransactionBuilder, TransactionKind,
    },
    user::UserID,
};

const UNKNOWN_CATEGORY_SOURCE: &str = "unknown";

/// Map `extracted` to an expense for `user_id` that records where it came from.
///
/// The extraction result must have a usable amount, which
/// [parse_extraction_output](super::parse_extraction_output) guarantees.
/// Missing or unrecognised values fall back to defaults: the date of
/// `processed_at`, the "other expenses" category and the "other" payment method.
///
/// The description is cut to [MAX_DESCRIPTION_LENGTH] characters. The receipt
/// provenance keeps the full merchant name.
pub fn normalize(
    extracted: &ExtractionResult,
    file: &UploadedFile,
    user_id: UserID,
    processed_at: OffsetDateTime,
) -> TransactionBuilder {
    let merchant = extracted
        .merchant
        .as_deref()
        .map(str::trim)
        .filter(|merchant| !merchant.is_empty());

    let description = match merchant {
        Some(merchant) => format!("Receipt from {merchant}")
            .chars()
            .take(MAX_DESCRIPTION_LENGTH)
            .collect(),
        None => "Receipt upload".to_owned(),
    };

    let date = extracted
        .date
        .as_deref()
        .and_then(parse_receipt_date)
        .unwrap_or_else(|| processed_at.date());

    let category_source = extracted
        .category_source
        .as_deref()
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .unwrap_or(UNKNOWN_CATEGORY_SOURCE);

    let receipt = ReceiptProvenance {
        merchant: merchant.map(str::to_owned),
        items: extracted.item_descriptions(),
        category_source: category_source.to_owned(),
        original_filename: file.original_name.clone(),
        stored_filename: file.filename.clone(),
        file_size: file.size,
        file_hash: file.sha256.clone(),
        processed_at,
        file_path: file.path.display().to_string(),
    };

    Transaction::build(
        user_id,
        TransactionKind::Expense,
        Category::resolve_expense(extracted.category.as_deref()),
        extracted.amount().unwrap_or_default(),
        date,
    )
    .description(description)
    .payment_method(Some(PaymentMethod::Other))
    .receipt(receipt)
}

/// Parse a purchase date written as "2024-03-01", "2024/03/01" or an RFC 3339 timestamp.
fn parse_receipt_date(text: &str) -> Option<Date> {
    let text = text.trim();

    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .or_else(|_| Date::parse(text, format_description!("[year]/[month]/[day]")))
        .ok()
        .or_else(|| {
            OffsetDateTime::parse(text, &Rfc3339)
                .ok()
                .map(OffsetDateTime::date)
        })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use time::macros::{date, datetime};

    use crate::{
        receipt::{
            extraction::{Amount, ExtractionResult, LineItem},
            normalize::{normalize, parse_receipt_date},
            upload::UploadedFile,
        },
        transaction::{Category, MAX_DESCRIPTION_LENGTH, PaymentMethod, TransactionKind},
        user::UserID,
    };

    fn uploaded_file() -> UploadedFile {
        UploadedFile {
            filename: "receipt-1709294400000-abc.jpg".to_owned(),
            field_name: "receipt".to_owned(),
            content_type: "image/jpeg".to_owned(),
            size: 1024,
            path: PathBuf::from("/srv/uploads/receipts/receipt-1709294400000-abc.jpg"),
            original_name: "IMG_0001.jpg".to_owned(),
            sha256: "ab".repeat(32),
        }
    }

    fn extracted(category: Option<&str>) -> ExtractionResult {
        ExtractionResult {
            total: Some(Amount::Number(42.5)),
            merchant: Some("Cafe X".to_owned()),
            date: Some("2024-02-28".to_owned()),
            category: category.map(str::to_owned),
            items: Some(vec![LineItem::Text("Flat white".to_owned())]),
            ..Default::default()
        }
    }

    #[test]
    fn builds_expense_with_provenance() {
        let processed_at = datetime!(2024-03-01 12:00 UTC);

        let got = normalize(
            &extracted(Some("food")),
            &uploaded_file(),
            UserID::new(7),
            processed_at,
        );

        assert_eq!(got.user_id, UserID::new(7));
        assert_eq!(got.kind, TransactionKind::Expense);
        assert_eq!(got.category, Category::Food);
        assert_eq!(got.amount, 42.5);
        assert_eq!(got.description.as_deref(), Some("Receipt from Cafe X"));
        assert_eq!(got.date, date!(2024 - 02 - 28));
        assert_eq!(got.payment_method, Some(PaymentMethod::Other));
        assert_eq!(got.validate(), Ok(()));

        let receipt = got.receipt.expect("normalized transaction has no receipt");
        assert_eq!(receipt.merchant.as_deref(), Some("Cafe X"));
        assert_eq!(receipt.items, ["Flat white"]);
        assert_eq!(receipt.category_source, "unknown");
        assert_eq!(receipt.original_filename, "IMG_0001.jpg");
        assert_eq!(receipt.stored_filename, "receipt-1709294400000-abc.jpg");
        assert_eq!(receipt.file_size, 1024);
        assert_eq!(receipt.processed_at, processed_at);
        assert_eq!(
            receipt.file_path,
            "/srv/uploads/receipts/receipt-1709294400000-abc.jpg"
        );
    }

    #[test]
    fn long_merchant_is_cut_from_description_only() {
        let merchant = "Ü".repeat(600);
        let result = ExtractionResult {
            merchant: Some(merchant.clone()),
            ..extracted(Some("food"))
        };

        let got = normalize(
            &result,
            &uploaded_file(),
            UserID::new(1),
            datetime!(2024-03-01 12:00 UTC),
        );

        let description = got.description.as_deref().unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_LENGTH);
        assert!(description.starts_with("Receipt from ÜÜÜ"));
        assert_eq!(got.validate(), Ok(()));
        assert_eq!(
            got.receipt.as_ref().and_then(|receipt| receipt.merchant.as_deref()),
            Some(merchant.as_str())
        );
    }

    #[test]
    fn keeps_known_expense_category() {
        let got = normalize(
            &extracted(Some("Groceries ")),
            &uploaded_file(),
            UserID::new(1),
            datetime!(2024-03-01 12:00 UTC),
        );

        assert_eq!(got.category, Category::Groceries);
    }

    #[test]
    fn unknown_category_falls_back_to_other_expenses() {
        for category in [Some("bogus_category"), Some("salary"), None] {
            let got = normalize(
                &extracted(category),
                &uploaded_file(),
                UserID::new(1),
                datetime!(2024-03-01 12:00 UTC),
            );

            assert_eq!(got.category, Category::OtherExpenses, "{category:?}");
        }
    }

    #[test]
    fn defaults_when_merchant_and_date_are_missing() {
        let result = ExtractionResult {
            amount_paid: Some(Amount::Text("12.30".to_owned())),
            merchant: Some("   ".to_owned()),
            date: Some("last Tuesday".to_owned()),
            ..Default::default()
        };

        let got = normalize(
            &result,
            &uploaded_file(),
            UserID::new(1),
            datetime!(2024-03-01 23:30 UTC),
        );

        assert_eq!(got.amount, 12.3);
        assert_eq!(got.description.as_deref(), Some("Receipt upload"));
        assert_eq!(got.date, date!(2024 - 03 - 01));
        let receipt = got.receipt.unwrap();
        assert_eq!(receipt.merchant, None);
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn parses_supported_date_formats() {
        assert_eq!(parse_receipt_date("2024-03-01"), Some(date!(2024 - 03 - 01)));
        assert_eq!(parse_receipt_date("2024/03/01"), Some(date!(2024 - 03 - 01)));
        assert_eq!(
            parse_receipt_date("2024-03-01T09:15:00+13:00"),
            Some(date!(2024 - 03 - 01))
        );
        assert_eq!(parse_receipt_date("01/03/2024"), None);
    }
}
