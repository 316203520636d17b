//! Repository trait for habits and their tag links.

use crate::domain::entities::{Habit, HabitChanges, HabitFilter, NewHabit};
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for managing habits.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgHabitRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HabitRepository: Send + Sync {
    async fn create(&self, new_habit: NewHabit) -> Result<Habit, AppError>;

    async fn find_by_id(&self, user_id: &str, id: &str) -> Result<Option<Habit>, AppError>;

    /// Lists habits matching `filter`.
    ///
    /// # Arguments
    ///
    /// - `order_by` - An `ORDER BY` body produced by [`crate::utils::sorting`];
    ///   only mapped column names ever reach this argument
    /// - `page` - Page number (1-indexed)
    /// - `page_size` - Number of items per page
    async fn list(
        &self,
        user_id: &str,
        filter: &HabitFilter,
        order_by: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Habit>, AppError>;

    async fn count(&self, user_id: &str, filter: &HabitFilter) -> Result<i64, AppError>;

    /// Replaces the editable fields. Returns `Ok(false)` if no such habit.
    async fn update(&self, user_id: &str, id: &str, changes: HabitChanges)
    -> Result<bool, AppError>;

    /// Deletes a habit with its entries and tag links. Returns `Ok(false)` if no such habit.
    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, AppError>;

    /// Names of the tags linked to a habit, alphabetically.
    async fn tag_names(&self, habit_id: &str) -> Result<Vec<String>, AppError>;

    async fn tag_ids(&self, habit_id: &str) -> Result<Vec<String>, AppError>;

    /// Replaces the habit's tag links with exactly `tag_ids`, atomically.
    async fn replace_tags(&self, habit_id: &str, tag_ids: Vec<String>) -> Result<(), AppError>;

    /// Returns `Ok(false)` if the tag was not linked.
    async fn remove_tag(&self, habit_id: &str, tag_id: &str) -> Result<bool, AppError>;

    /// Non-archived habits with an automation source, across all users.
    async fn list_automated(&self) -> Result<Vec<Habit>, AppError>;
}
