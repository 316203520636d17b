//! Repository trait for users.

use crate::domain::entities::{NewUser, User};
use crate::error::AppError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_identity_id(&self, identity_id: &str) -> Result<Option<User>, AppError>;

    /// Inserts the user, or returns the existing row with the same `identity_id`.
    ///
    /// Safe under concurrent first requests from the same identity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn get_or_create(&self, new_user: NewUser) -> Result<User, AppError>;

    /// Renames a user. Returns `Ok(false)` if the user doesn't exist.
    async fn update_name(&self, id: &str, name: &str) -> Result<bool, AppError>;

    /// Lists users ordered by creation time (admin CLI).
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError>;

    /// Round-trips to the database. Used by the health check.
    async fn ping(&self) -> Result<(), AppError>;
}
