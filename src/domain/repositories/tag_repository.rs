//! Repository trait for tags.

use crate::domain::entities::{NewTag, Tag, TagChanges};
use crate::error::AppError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the user already has a tag with this name.
    async fn create(&self, new_tag: NewTag) -> Result<Tag, AppError>;

    async fn find_by_id(&self, user_id: &str, id: &str) -> Result<Option<Tag>, AppError>;

    async fn find_by_name(&self, user_id: &str, name: &str) -> Result<Option<Tag>, AppError>;

    /// All tags of a user, ordered by name.
    async fn list(&self, user_id: &str) -> Result<Vec<Tag>, AppError>;

    /// The subset of `ids` that exist and belong to the user.
    async fn existing_ids(&self, user_id: &str, ids: Vec<String>) -> Result<Vec<String>, AppError>;

    async fn update(&self, user_id: &str, id: &str, changes: TagChanges) -> Result<bool, AppError>;

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, AppError>;
}
