//! CSV entry import job.

use chrono::{DateTime, Utc};

use super::coded_enum;

coded_enum! {
    pub enum ImportJobStatus {
        Pending = 0,
        Processing = 1,
        Completed = 2,
        Failed = 3,
    }
}

impl ImportJobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, ImportJobStatus::Completed | ImportJobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryImportJob {
    pub id: String,
    pub user_id: String,
    pub status: ImportJobStatus,
    pub file_name: String,
    pub file_content: Vec<u8>,
    pub total_records: i32,
    pub processed_records: i32,
    pub successful_records: i32,
    pub failed_records: i32,
    /// One message per failed row, e.g. `row 3: habit not found`.
    pub errors: Vec<String>,
    pub created_at_utc: DateTime<Utc>,
    pub completed_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewImportJob {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub file_content: Vec<u8>,
}

/// Counters and status written back by the import worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportJobProgress {
    pub status: ImportJobStatus,
    pub total_records: i32,
    pub processed_records: i32,
    pub successful_records: i32,
    pub failed_records: i32,
    pub errors: Vec<String>,
    pub completed_at_utc: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_statuses() {
        assert!(!ImportJobStatus::Pending.is_finished());
        assert!(!ImportJobStatus::Processing.is_finished());
        assert!(ImportJobStatus::Completed.is_finished());
        assert!(ImportJobStatus::Failed.is_finished());
    }
}
