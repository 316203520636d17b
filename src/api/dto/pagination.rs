//! Paging parameters and collection envelopes.

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{DisplayFromStr, serde_as};

use crate::error::AppError;
use crate::utils::hateoas::LinkDto;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination query parameters.
///
/// Uses `serde_with` to parse page numbers from query strings as integers,
/// which keeps working when the struct is `#[serde(flatten)]`ed.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<i64>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl PaginationParams {
    /// Validates the parameters and returns `(page, page_size)`.
    ///
    /// # Defaults
    ///
    /// - `page`: 1
    /// - `page_size`: 10
    ///
    /// # Validation
    ///
    /// - Page must be > 0
    /// - Page size must be between 1 and 100
    /// - The row offset of the page must fit in an `i64`
    pub fn resolve(&self) -> Result<(i64, i64), AppError> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        if page < 1 {
            return Err(AppError::bad_request(
                "Page must be greater than 0",
                json!({ "page": page }),
            ));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::bad_request(
                format!("Page size must be between 1 and {MAX_PAGE_SIZE}"),
                json!({ "page_size": page_size }),
            ));
        }

        if page_offset(page, page_size).is_none() {
            return Err(AppError::bad_request(
                "Page is out of range",
                json!({ "page": page }),
            ));
        }

        Ok((page, page_size))
    }
}

/// Number of rows before `page`, or `None` when it does not fit in an `i64`.
pub fn page_offset(page: i64, page_size: i64) -> Option<i64> {
    page.checked_sub(1)?.checked_mul(page_size)
}

/// One page of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkDto>>,
}

impl<T> PaginationResult<T> {
    pub fn new(data: Vec<T>, page: i64, page_size: i64, total_count: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_count + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            data,
            page,
            page_size,
            total_count,
            total_pages,
            has_previous_page: page > 1,
            has_next_page: page < total_pages,
            links: None,
        }
    }
}

/// An unpaginated collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionResult<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<LinkDto>>,
}
