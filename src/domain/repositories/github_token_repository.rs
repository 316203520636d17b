//! Repository trait for stored GitHub tokens.

use crate::domain::entities::{GitHubAccessToken, NewGitHubAccessToken};
use crate::error::AppError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitHubTokenRepository: Send + Sync {
    /// Stores the user's token, replacing any previous one.
    async fn upsert(&self, token: NewGitHubAccessToken) -> Result<(), AppError>;

    async fn find_by_user(&self, user_id: &str) -> Result<Option<GitHubAccessToken>, AppError>;

    /// Returns `Ok(false)` if the user had no token.
    async fn delete_by_user(&self, user_id: &str) -> Result<bool, AppError>;
}
