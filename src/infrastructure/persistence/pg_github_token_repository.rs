//! PostgreSQL implementation of GitHub token repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{GitHubAccessToken, NewGitHubAccessToken};
use crate::domain::repositories::GitHubTokenRepository;
use crate::error::AppError;

#[derive(FromRow)]
struct TokenRow {
    id: String,
    user_id: String,
    token: String,
    expires_at_utc: DateTime<Utc>,
    created_at_utc: DateTime<Utc>,
}

pub struct PgGitHubTokenRepository {
    pool: Arc<PgPool>,
}

impl PgGitHubTokenRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GitHubTokenRepository for PgGitHubTokenRepository {
    async fn upsert(&self, token: NewGitHubAccessToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO github_access_tokens (id, user_id, token, expires_at_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET token = EXCLUDED.token,
                expires_at_utc = EXCLUDED.expires_at_utc,
                created_at_utc = NOW()
            "#,
        )
        .bind(&token.id)
        .bind(&token.user_id)
        .bind(&token.token)
        .bind(token.expires_at_utc)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Option<GitHubAccessToken>, AppError> {
        let row: Option<TokenRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, token, expires_at_utc, created_at_utc
            FROM github_access_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|r| GitHubAccessToken {
            id: r.id,
            user_id: r.user_id,
            token: r.token,
            expires_at_utc: r.expires_at_utc,
            created_at_utc: r.created_at_utc,
        }))
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM github_access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
