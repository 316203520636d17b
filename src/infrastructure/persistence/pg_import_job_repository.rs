//! PostgreSQL implementation of import job repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{EntryImportJob, ImportJobProgress, ImportJobStatus, NewImportJob};
use crate::domain::repositories::ImportJobRepository;
use crate::error::AppError;

use super::decode_code;

const JOB_COLUMNS: &str = "id, user_id, status, file_name, file_content, total_records, \
     processed_records, successful_records, failed_records, errors, created_at_utc, \
     completed_at_utc";

#[derive(FromRow)]
struct JobRow {
    id: String,
    user_id: String,
    status: i32,
    file_name: String,
    file_content: Vec<u8>,
    total_records: i32,
    processed_records: i32,
    successful_records: i32,
    failed_records: i32,
    errors: Vec<String>,
    created_at_utc: DateTime<Utc>,
    completed_at_utc: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for EntryImportJob {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(EntryImportJob {
            status: decode_code::<ImportJobStatus>(row.status)?,
            id: row.id,
            user_id: row.user_id,
            file_name: row.file_name,
            file_content: row.file_content,
            total_records: row.total_records,
            processed_records: row.processed_records,
            successful_records: row.successful_records,
            failed_records: row.failed_records,
            errors: row.errors,
            created_at_utc: row.created_at_utc,
            completed_at_utc: row.completed_at_utc,
        })
    }
}

pub struct PgImportJobRepository {
    pool: Arc<PgPool>,
}

impl PgImportJobRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImportJobRepository for PgImportJobRepository {
    async fn create(&self, new_job: NewImportJob) -> Result<EntryImportJob, AppError> {
        let row: JobRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO entry_import_jobs (id, user_id, status, file_name, file_content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(&new_job.id)
        .bind(&new_job.user_id)
        .bind(i32::from(ImportJobStatus::Pending))
        .bind(&new_job.file_name)
        .bind(&new_job.file_content)
        .fetch_one(self.pool.as_ref())
        .await?;

        row.try_into()
    }

    async fn find_by_id(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<EntryImportJob>, AppError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM entry_import_jobs WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(EntryImportJob::try_from).transpose()
    }

    async fn find_for_processing(&self, id: &str) -> Result<Option<EntryImportJob>, AppError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM entry_import_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(EntryImportJob::try_from).transpose()
    }

    async fn list(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<EntryImportJob>, AppError> {
        let offset = super::offset_for(page, page_size)?;

        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM entry_import_jobs
            WHERE user_id = $1
            ORDER BY created_at_utc DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(EntryImportJob::try_from).collect()
    }

    async fn count(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entry_import_jobs WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(self.pool.as_ref())
                .await?;

        Ok(count)
    }

    async fn update_progress(
        &self,
        id: &str,
        progress: ImportJobProgress,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE entry_import_jobs SET
                status = $2,
                total_records = $3,
                processed_records = $4,
                successful_records = $5,
                failed_records = $6,
                errors = $7,
                completed_at_utc = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(i32::from(progress.status))
        .bind(progress.total_records)
        .bind(progress.processed_records)
        .bind(progress.successful_records)
        .bind(progress.failed_records)
        .bind(progress.errors)
        .bind(progress.completed_at_utc)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn pending_ids(&self) -> Result<Vec<String>, AppError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM entry_import_jobs WHERE status = $1 ORDER BY created_at_utc, id",
        )
        .bind(i32::from(ImportJobStatus::Pending))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids)
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM entry_import_jobs
            WHERE status IN ($1, $2) AND created_at_utc < $3
            "#,
        )
        .bind(i32::from(ImportJobStatus::Completed))
        .bind(i32::from(ImportJobStatus::Failed))
        .bind(cutoff)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
