//! PostgreSQL implementation of tag repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{NewTag, Tag, TagChanges};
use crate::domain::repositories::TagRepository;
use crate::error::AppError;

const TAG_COLUMNS: &str = "id, user_id, name, description, created_at_utc, updated_at_utc";

#[derive(FromRow)]
struct TagRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    created_at_utc: DateTime<Utc>,
    updated_at_utc: Option<DateTime<Utc>>,
}

impl From<TagRow> for Tag {
    fn from(row: TagRow) -> Self {
        Tag {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            created_at_utc: row.created_at_utc,
            updated_at_utc: row.updated_at_utc,
        }
    }
}

/// Rewrites the generic unique-violation conflict into a tag-specific one.
fn name_conflict(e: AppError, name: &str) -> AppError {
    match e {
        AppError::Conflict { .. } => AppError::conflict(
            format!("The tag '{name}' already exists"),
            json!({ "name": name }),
        ),
        other => other,
    }
}

pub struct PgTagRepository {
    pool: Arc<PgPool>,
}

impl PgTagRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn create(&self, new_tag: NewTag) -> Result<Tag, AppError> {
        let row: TagRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO tags (id, user_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {TAG_COLUMNS}
            "#
        ))
        .bind(&new_tag.id)
        .bind(&new_tag.user_id)
        .bind(&new_tag.name)
        .bind(&new_tag.description)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| name_conflict(e.into(), &new_tag.name))?;

        Ok(row.into())
    }

    async fn find_by_id(&self, user_id: &str, id: &str) -> Result<Option<Tag>, AppError> {
        let row: Option<TagRow> = sqlx::query_as(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Tag::from))
    }

    async fn find_by_name(&self, user_id: &str, name: &str) -> Result<Option<Tag>, AppError> {
        let row: Option<TagRow> = sqlx::query_as(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE user_id = $1 AND name = $2"
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Tag::from))
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Tag>, AppError> {
        let rows: Vec<TagRow> = sqlx::query_as(&format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE user_id = $1 ORDER BY name, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Tag::from).collect())
    }

    async fn existing_ids(&self, user_id: &str, ids: Vec<String>) -> Result<Vec<String>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<String> =
            sqlx::query_scalar("SELECT id FROM tags WHERE user_id = $1 AND id = ANY($2)")
                .bind(user_id)
                .bind(ids)
                .fetch_all(self.pool.as_ref())
                .await?;

        Ok(found)
    }

    async fn update(&self, user_id: &str, id: &str, changes: TagChanges) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tags
            SET name = $3, description = $4, updated_at_utc = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&changes.name)
        .bind(&changes.description)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| name_conflict(e.into(), &changes.name))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
