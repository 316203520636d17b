//! PostgreSQL implementation of user repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{NewUser, User};
use crate::domain::repositories::UserRepository;
use crate::error::AppError;

const USER_COLUMNS: &str = "id, email, name, identity_id, created_at_utc, updated_at_utc";

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    identity_id: String,
    created_at_utc: DateTime<Utc>,
    updated_at_utc: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            name: row.name,
            identity_id: row.identity_id,
            created_at_utc: row.created_at_utc,
            updated_at_utc: row.updated_at_utc,
        }
    }
}

pub struct PgUserRepository {
    pool: Arc<PgPool>,
}

impl PgUserRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(row.map(User::from))
    }

    async fn find_by_identity_id(&self, identity_id: &str) -> Result<Option<User>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE identity_id = $1"
        ))
        .bind(identity_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_or_create(&self, new_user: NewUser) -> Result<User, AppError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row: UserRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, email, name, identity_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (identity_id) DO UPDATE SET identity_id = EXCLUDED.identity_id
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.id)
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.identity_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn update_name(&self, id: &str, name: &str) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET name = $2, updated_at_utc = NOW() WHERE id = $1")
                .bind(id)
                .bind(name)
                .execute(self.pool.as_ref())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at_utc, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
