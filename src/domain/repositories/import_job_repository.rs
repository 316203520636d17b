//! Repository trait for CSV import jobs.

use crate::domain::entities::{EntryImportJob, ImportJobProgress, NewImportJob};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportJobRepository: Send + Sync {
    async fn create(&self, new_job: NewImportJob) -> Result<EntryImportJob, AppError>;

    async fn find_by_id(&self, user_id: &str, id: &str)
    -> Result<Option<EntryImportJob>, AppError>;

    /// Loads a job regardless of owner. Used by the import worker.
    async fn find_for_processing(&self, id: &str) -> Result<Option<EntryImportJob>, AppError>;

    /// Lists a user's jobs, newest first.
    async fn list(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<EntryImportJob>, AppError>;

    async fn count(&self, user_id: &str) -> Result<i64, AppError>;

    async fn update_progress(&self, id: &str, progress: ImportJobProgress)
    -> Result<(), AppError>;

    /// Ids of jobs still waiting to be processed, oldest first.
    async fn pending_ids(&self) -> Result<Vec<String>, AppError>;

    /// Deletes completed or failed jobs created before `cutoff`. Returns the number removed.
    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
