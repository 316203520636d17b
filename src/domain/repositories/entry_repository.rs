//! Repository trait for habit entries.

use crate::domain::entities::{DailyEntryCount, Entry, EntryChanges, EntryFilter, NewEntry};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for entries.
///
/// Inserting entries also advances the owning habit's `last_completed_at_utc`
/// in the same transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntryRepository: Send + Sync {
    async fn create(&self, new_entry: NewEntry) -> Result<Entry, AppError>;

    /// Inserts all entries in a single transaction; either all or none are stored.
    async fn create_batch(&self, new_entries: Vec<NewEntry>) -> Result<Vec<Entry>, AppError>;

    async fn find_by_id(&self, user_id: &str, id: &str) -> Result<Option<Entry>, AppError>;

    /// Lists entries matching `filter`. See
    /// [`crate::domain::repositories::HabitRepository::list`] for `order_by`.
    async fn list(
        &self,
        user_id: &str,
        filter: &EntryFilter,
        order_by: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Entry>, AppError>;

    async fn count(&self, user_id: &str, filter: &EntryFilter) -> Result<i64, AppError>;

    async fn update(&self, user_id: &str, id: &str, changes: EntryChanges)
    -> Result<bool, AppError>;

    async fn set_archived(&self, user_id: &str, id: &str, archived: bool)
    -> Result<bool, AppError>;

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, AppError>;

    /// Per-day counts of the user's non-archived entries, oldest first.
    async fn daily_counts(&self, user_id: &str) -> Result<Vec<DailyEntryCount>, AppError>;

    /// The subset of `external_ids` that are already stored.
    async fn existing_external_ids(
        &self,
        external_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError>;
}
