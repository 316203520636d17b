//! DTOs for CSV entry import endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::dto::pagination::PaginationParams;
use crate::domain::entities::{EntryImportJob, ImportJobStatus};
use crate::utils::data_shaping::Shapeable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryImportJobDto {
    pub id: String,
    pub status: ImportJobStatus,
    pub file_name: String,
    pub total_records: i32,
    pub processed_records: i32,
    pub successful_records: i32,
    pub failed_records: i32,
    pub errors: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
    pub completed_at_utc: Option<DateTime<Utc>>,
}

impl Shapeable for EntryImportJobDto {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "status",
        "fileName",
        "totalRecords",
        "processedRecords",
        "successfulRecords",
        "failedRecords",
        "errors",
        "createdAtUtc",
        "completedAtUtc",
    ];
}

impl From<EntryImportJob> for EntryImportJobDto {
    fn from(job: EntryImportJob) -> Self {
        Self {
            id: job.id,
            status: job.status,
            file_name: job.file_name,
            total_records: job.total_records,
            processed_records: job.processed_records,
            successful_records: job.successful_records,
            failed_records: job.failed_records,
            errors: job.errors,
            created_at_utc: job.created_at_utc,
            completed_at_utc: job.completed_at_utc,
        }
    }
}

/// Query parameters for `GET /api/entries/imports`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportsQuery {
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}
