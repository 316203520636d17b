//! PostgreSQL repository implementations.
//!
//! Concrete implementations of domain repository traits using SQLx. Queries are
//! checked at runtime; dynamic filters and sorting go through `QueryBuilder`,
//! and only column names from a sort mapping are ever spliced into SQL.
//!
//! # Repositories
//!
//! - [`PgUserRepository`] - Users mirrored from the identity provider
//! - [`PgHabitRepository`] - Habits and habit-tag links
//! - [`PgTagRepository`] - Tags
//! - [`PgEntryRepository`] - Entries and daily statistics
//! - [`PgGitHubTokenRepository`] - Encrypted GitHub tokens
//! - [`PgImportJobRepository`] - CSV import jobs

pub mod pg_entry_repository;
pub mod pg_github_token_repository;
pub mod pg_habit_repository;
pub mod pg_import_job_repository;
pub mod pg_tag_repository;
pub mod pg_user_repository;

pub use pg_entry_repository::PgEntryRepository;
pub use pg_github_token_repository::PgGitHubTokenRepository;
pub use pg_habit_repository::PgHabitRepository;
pub use pg_import_job_repository::PgImportJobRepository;
pub use pg_tag_repository::PgTagRepository;
pub use pg_user_repository::PgUserRepository;

use serde_json::json;

use crate::api::dto::pagination::page_offset;
use crate::error::AppError;

/// Row offset for a page, rejecting pages past the end of the `i64` range.
fn offset_for(page: i64, page_size: i64) -> Result<i64, AppError> {
    page_offset(page, page_size).ok_or_else(|| {
        AppError::bad_request("Page is out of range", json!({ "page": page }))
    })
}

/// Converts a stored integer code into its enum, as an internal error if unknown.
fn decode_code<T: TryFrom<i32, Error = String>>(code: i32) -> Result<T, AppError> {
    T::try_from(code).map_err(|e| {
        tracing::error!(code, error = %e, "Unknown enum code in database row");
        AppError::internal("Corrupt database row", json!({}))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_for_rejects_overflow() {
        assert_eq!(offset_for(2, 25).unwrap(), 25);
        assert!(offset_for(i64::MAX, 100).is_err());
    }
}
