//! Lists the transactions a user created from receipts.

use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    database_id::TransactionId,
    pagination::{Pagination, PaginationConfig},
    response::render_json,
    transaction::{SQLiteTransactionStore, Transaction, TransactionStore},
    user::{UserID, parse_user_id},
};

/// The state needed for browsing receipts.
#[derive(Debug, Clone)]
pub struct ReceiptHistoryState {
    /// The store the receipt transactions are read from.
    pub transaction_store: SQLiteTransactionStore,
    /// The config that controls the page size.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ReceiptHistoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            transaction_store: state.transaction_store.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters of a receipt history request.
///
/// Values are kept as text so that malformed values produce this API's
/// error responses instead of the framework's.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// The ID of the user whose receipts to list.
    pub user_id: Option<String>,
    /// The one-based page number.
    pub page: Option<String>,
    /// The number of transactions per page.
    pub limit: Option<String>,
}

/// One page of a user's receipt transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptHistory {
    /// The transactions on this page, newest first.
    pub data: Vec<Transaction>,
    /// Where this page sits in the full history.
    pub pagination: Pagination,
}

/// Get one page of the transactions `query.user_id` created from receipts,
/// newest first.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidUserIdentifier] if the user ID is missing or malformed,
/// - [Error::InvalidPagination] if the page or limit is less than one,
/// - or any error from `store`.
pub fn receipt_history<S: TransactionStore>(
    query: &HistoryQuery,
    config: &PaginationConfig,
    store: &S,
) -> Result<ReceiptHistory, Error> {
    let user_id = parse_user_id(query.user_id.as_deref())?;
    let page = config.page_request(query.page.as_deref(), query.limit.as_deref())?;

    let total = store.count_receipts(user_id)?;
    let pagination = Pagination::new(page, total);
    let data = if page.page > pagination.total_pages {
        Vec::new()
    } else {
        store.get_receipts(user_id, page)?
    };

    Ok(ReceiptHistory { data, pagination })
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    success: bool,
    #[serde(flatten)]
    history: ReceiptHistory,
}

/// A route handler for listing a user's receipt transactions.
pub async fn get_receipt_history(
    State(state): State<ReceiptHistoryState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match receipt_history(&query, &state.pagination_config, &state.transaction_store) {
        Ok(history) => render_json(
            StatusCode::OK,
            HistoryResponse {
                success: true,
                history,
            },
        ),
        Err(error) => error.into_response(),
    }
}

/// The query parameters of a single receipt request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptQuery {
    /// The ID of the user that owns the receipt.
    pub user_id: Option<String>,
}

/// Get the transaction `id` if it was created from a receipt uploaded by `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist, belongs to
/// another user or was not created from a receipt.
pub fn find_receipt<S: TransactionStore>(
    id: TransactionId,
    user_id: UserID,
    store: &S,
) -> Result<Transaction, Error> {
    let transaction = store.get(id)?;

    if transaction.user_id != user_id || transaction.receipt.is_none() {
        return Err(Error::NotFound);
    }

    Ok(transaction)
}

#[derive(Debug, Serialize)]
struct ReceiptResponse {
    success: bool,
    data: Transaction,
}

/// A route handler for getting one receipt transaction.
pub async fn get_receipt(
    State(state): State<ReceiptHistoryState>,
    Path(transaction_id): Path<String>,
    Query(query): Query<ReceiptQuery>,
) -> Response {
    let user_id = match parse_user_id(query.user_id.as_deref()) {
        Ok(user_id) => user_id,
        Err(error) => return error.into_response(),
    };

    let Ok(id) = transaction_id.parse::<TransactionId>() else {
        return Error::NotFound.into_response();
    };

    match find_receipt(id, user_id, &state.transaction_store) {
        Ok(transaction) => render_json(
            StatusCode::OK,
            ReceiptResponse {
                success: true,
                data: transaction,
            },
        ),
        Err(error) => error.into_response(),
    }
}
