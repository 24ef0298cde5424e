//! This modules defines the common functionality for paging data.

use serde::{Deserialize, Serialize};

use crate::Error;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may ask for. Larger requests are
    /// clamped to this value.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Validate the raw `page` and `limit` query parameters of a request,
    /// filling in defaults for missing values.
    ///
    /// # Errors
    /// Returns [Error::InvalidPagination] if either value is not an integer
    /// greater than or equal to one.
    pub fn page_request(
        &self,
        page: Option<&str>,
        limit: Option<&str>,
    ) -> Result<PageRequest, Error> {
        let page = parse_positive(page)?.unwrap_or(self.default_page);
        let limit = parse_positive(limit)?
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size);

        Ok(PageRequest { page, limit })
    }
}

fn parse_positive(raw: Option<&str>) -> Result<Option<u64>, Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value >= 1 => Ok(Some(value)),
            _ => Err(Error::InvalidPagination),
        },
    }
}

/// A validated request for one page of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The one-based page number.
    pub page: u64,
    /// The maximum number of items on a page.
    pub limit: u64,
}

impl PageRequest {
    /// The number of items that come before this page, or `None` if it does
    /// not fit in an SQL offset.
    pub fn offset(&self) -> Option<i64> {
        let offset = self.page.checked_sub(1)?.checked_mul(self.limit)?;

        i64::try_from(offset).ok()
    }
}

/// Describes where a page sits in the full result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The one-based page number.
    pub page: u64,
    /// The maximum number of items on a page.
    pub limit: u64,
    /// The number of items across all pages.
    pub total: u64,
    /// The number of pages needed to show every item.
    pub total_pages: u64,
    /// Whether there is a page after this one.
    pub has_next: bool,
    /// Whether there is a page before this one.
    pub has_prev: bool,
}

impl Pagination {
    /// Compute the pagination metadata for `request` over `total` items.
    pub fn new(request: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(request.limit);

        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}
