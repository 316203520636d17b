//! CSV entry imports: job intake, listing and background processing.
//!
//! Uploaded files are stored with a `Pending` job and their id is pushed onto
//! a bounded queue drained by [`crate::jobs::import_worker`]. The worker calls
//! [`ImportService::process`], which records per-row failures instead of
//! aborting, so one bad line never loses the rest of the file.
//!
//! # File Format
//!
//! ```text
//! habit_id,date,value,notes
//! h_0190...,2025-01-10,30,Evening run
//! h_0190...,2025-01-11,,
//! ```
//!
//! `value` defaults to 1 when blank.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::api::dto::imports::{EntryImportJobDto, ImportsQuery};
use crate::api::dto::pagination::PaginationResult;
use crate::application::services::entry_service::record_created;
use crate::application::services::habit_service::evict_user_habits;
use crate::application::services::query::{check_fields, shape_item};
use crate::domain::entities::{
    EntryImportJob, EntrySource, ImportJobProgress, ImportJobStatus, NewEntry, NewImportJob,
    new_id,
};
use crate::domain::repositories::{EntryRepository, HabitRepository, ImportJobRepository};
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::hateoas::{LinkBuilder, LinkDto, rel};

pub const MAX_IMPORT_FILE_BYTES: usize = 10 * 1024 * 1024;
const INSERT_CHUNK_SIZE: usize = 100;
const MAX_NOTES_CHARS: usize = 1000;

#[derive(Debug, Deserialize)]
struct CsvRow {
    habit_id: String,
    date: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

pub struct ImportService {
    jobs: Arc<dyn ImportJobRepository>,
    habits: Arc<dyn HabitRepository>,
    entries: Arc<dyn EntryRepository>,
    cache: Arc<dyn CacheService>,
    queue: mpsc::Sender<String>,
    links: LinkBuilder,
}

impl ImportService {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        habits: Arc<dyn HabitRepository>,
        entries: Arc<dyn EntryRepository>,
        cache: Arc<dyn CacheService>,
        queue: mpsc::Sender<String>,
        links: LinkBuilder,
    ) -> Self {
        Self {
            jobs,
            habits,
            entries,
            cache,
            queue,
            links,
        }
    }

    /// Stores an uploaded CSV file and queues it for processing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the file is empty, larger than
    /// 10 MiB or not named `*.csv`.
    pub async fn create_job(
        &self,
        user_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<EntryImportJobDto, AppError> {
        validate_upload(file_name, &content)?;

        let job = self
            .jobs
            .create(NewImportJob {
                id: new_id("ei"),
                user_id: user_id.to_string(),
                file_name: file_name.to_string(),
                file_content: content,
            })
            .await?;

        self.enqueue(&job.id);
        tracing::info!(user_id, job_id = %job.id, file_name, "Import job created");

        Ok(EntryImportJobDto::from(job))
    }

    /// Hands a job id to the worker. A full queue leaves the job `Pending`
    /// until the next startup re-enqueues it.
    pub fn enqueue(&self, job_id: &str) {
        if let Err(e) = self.queue.try_send(job_id.to_string()) {
            tracing::warn!(job_id, error = %e, "Import queue rejected job");
        }
    }

    pub async fn list(
        &self,
        user_id: &str,
        query: &ImportsQuery,
        hateoas: bool,
    ) -> Result<PaginationResult<Value>, AppError> {
        check_fields::<EntryImportJobDto>(query.fields.as_deref())?;
        let (page, page_size) = query.pagination.resolve()?;

        let jobs = self.jobs.list(user_id, page, page_size).await?;
        let total = self.jobs.count(user_id).await?;

        let fields = query.fields.as_deref();
        let data = jobs
            .into_iter()
            .map(|job| {
                let links = hateoas.then(|| self.job_links(&job.id, fields));
                shape_item(&EntryImportJobDto::from(job), fields, links)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = PaginationResult::new(data, page, page_size, total);
        if hateoas {
            let params = |page: i64| {
                vec![
                    ("fields", query.fields.clone()),
                    ("page", Some(page.to_string())),
                    ("page_size", Some(page_size.to_string())),
                ]
            };
            let path = "/api/entries/imports";
            let mut links = vec![
                self.links.link(path, &params(page), rel::SELF, "GET"),
                self.links.simple(path, rel::CREATE, "POST"),
            ];
            if result.has_previous_page {
                links.push(
                    self.links
                        .link(path, &params(page - 1), rel::PREVIOUS_PAGE, "GET"),
                );
            }
            if result.has_next_page {
                links.push(self.links.link(path, &params(page + 1), rel::NEXT_PAGE, "GET"));
            }
            result.links = Some(links);
        }
        Ok(result)
    }

    pub async fn get(
        &self,
        user_id: &str,
        id: &str,
        fields: Option<&str>,
        hateoas: bool,
    ) -> Result<Value, AppError> {
        check_fields::<EntryImportJobDto>(fields)?;

        let job = self
            .jobs
            .find_by_id(user_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Import job not found", json!({ "id": id })))?;

        let links = hateoas.then(|| self.job_links(id, fields));
        shape_item(&EntryImportJobDto::from(job), fields, links)
    }

    pub fn job_links(&self, id: &str, fields: Option<&str>) -> Vec<LinkDto> {
        vec![self.links.link(
            &format!("/api/entries/imports/{id}"),
            &[("fields", fields.map(str::to_string))],
            rel::SELF,
            "GET",
        )]
    }

    /// Processes one queued job to completion.
    ///
    /// Unknown and already finished jobs are skipped. A job that started
    /// processing always ends `Completed` or `Failed`.
    pub async fn process(&self, job_id: &str) -> Result<(), AppError> {
        let Some(job) = self.jobs.find_for_processing(job_id).await? else {
            tracing::warn!(job_id, "Import job disappeared before processing");
            return Ok(());
        };
        if job.status.is_finished() {
            return Ok(());
        }

        self.jobs
            .update_progress(job_id, progress(ImportJobStatus::Processing, 0, 0, vec![]))
            .await?;

        let final_progress = match self.import_rows(&job, Utc::now().date_naive()).await {
            Ok(Ok((successful, errors))) => {
                tracing::info!(
                    job_id,
                    successful,
                    failed = errors.len(),
                    "Import job completed"
                );
                progress(ImportJobStatus::Completed, successful, errors.len(), errors)
            }
            Ok(Err(reason)) => {
                tracing::warn!(job_id, reason = %reason, "Import file is unreadable");
                progress(ImportJobStatus::Failed, 0, 0, vec![reason])
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Import job aborted");
                progress(
                    ImportJobStatus::Failed,
                    0,
                    0,
                    vec![format!("import aborted: {e}")],
                )
            }
        };

        self.jobs.update_progress(job_id, final_progress).await?;
        evict_user_habits(self.cache.as_ref(), &job.user_id).await;
        Ok(())
    }

    /// Returns `Ok(Err(reason))` when the file itself cannot be read.
    async fn import_rows(
        &self,
        job: &EntryImportJob,
        today: NaiveDate,
    ) -> Result<Result<(usize, Vec<String>), String>, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(job.file_content.as_slice());

        match reader.headers() {
            Ok(headers) => {
                for required in ["habit_id", "date"] {
                    if !headers.iter().any(|h| h == required) {
                        return Ok(Err(format!("missing required column '{required}'")));
                    }
                }
            }
            Err(e) => return Ok(Err(format!("invalid CSV header: {e}"))),
        }

        let mut errors = Vec::new();
        let mut valid: Vec<(usize, NewEntry)> = Vec::new();
        let mut known_habits: HashMap<String, bool> = HashMap::new();

        for (index, record) in reader.deserialize::<CsvRow>().enumerate() {
            let row = index + 1;
            let row_data = match record {
                Ok(row_data) => row_data,
                Err(e) => {
                    errors.push(format!("row {row}: {e}"));
                    continue;
                }
            };

            let exists = match known_habits.get(&row_data.habit_id) {
                Some(exists) => *exists,
                None => {
                    let exists = self
                        .habits
                        .find_by_id(&job.user_id, &row_data.habit_id)
                        .await?
                        .is_some();
                    known_habits.insert(row_data.habit_id.clone(), exists);
                    exists
                }
            };
            if !exists {
                errors.push(format!("row {row}: habit '{}' not found", row_data.habit_id));
                continue;
            }

            match parse_row(row_data, &job.user_id, today) {
                Ok(entry) => valid.push((row, entry)),
                Err(reason) => errors.push(format!("row {row}: {reason}")),
            }
        }

        let mut successful = 0;
        for chunk in valid.chunks(INSERT_CHUNK_SIZE) {
            let batch: Vec<NewEntry> = chunk.iter().map(|(_, e)| e.clone()).collect();
            match self.entries.create_batch(batch).await {
                Ok(created) => successful += created.len(),
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to insert import chunk");
                    errors.extend(
                        chunk
                            .iter()
                            .map(|(row, _)| format!("row {row}: could not be saved")),
                    );
                }
            }
        }

        if successful > 0 {
            record_created(EntrySource::FileImport, successful as u64);
        }
        errors.sort_by_key(|e| row_number(e));
        Ok(Ok((successful, errors)))
    }
}

fn validate_upload(file_name: &str, content: &[u8]) -> Result<(), AppError> {
    if content.is_empty() {
        return Err(AppError::bad_request("File is empty", json!({ "file": file_name })));
    }
    if content.len() > MAX_IMPORT_FILE_BYTES {
        return Err(AppError::bad_request(
            "File size exceeds the 10 MiB limit",
            json!({ "size": content.len(), "max": MAX_IMPORT_FILE_BYTES }),
        ));
    }
    if !file_name.to_lowercase().ends_with(".csv") {
        return Err(AppError::bad_request(
            "Only CSV files are supported",
            json!({ "file": file_name }),
        ));
    }
    Ok(())
}

fn parse_row(row: CsvRow, user_id: &str, today: NaiveDate) -> Result<NewEntry, String> {
    let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}'", row.date))?;
    if date > today {
        return Err("date cannot be in the future".to_string());
    }

    let value = match row.value.as_deref().map(str::trim) {
        None | Some("") => 1,
        Some(raw) => raw
            .parse::<i32>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| format!("invalid value '{raw}'"))?,
    };

    let notes = row.notes.filter(|n| !n.trim().is_empty());
    if notes
        .as_ref()
        .is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS)
    {
        return Err("notes cannot exceed 1000 characters".to_string());
    }

    Ok(NewEntry {
        id: new_id("e"),
        habit_id: row.habit_id,
        user_id: user_id.to_string(),
        value,
        notes,
        source: EntrySource::FileImport,
        external_id: None,
        date,
    })
}

fn row_number(error: &str) -> usize {
    error
        .strip_prefix("row ")
        .and_then(|rest| rest.split(':').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(usize::MAX)
}

fn progress(
    status: ImportJobStatus,
    successful: usize,
    failed: usize,
    errors: Vec<String>,
) -> ImportJobProgress {
    let total = (successful + failed) as i32;
    ImportJobProgress {
        status,
        total_records: total,
        processed_records: total,
        successful_records: successful as i32,
        failed_records: failed as i32,
        errors,
        completed_at_utc: status.is_finished().then(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        AutomationSource, Entry, Frequency, FrequencyType, Habit, HabitStatus, HabitType, Target,
    };
    use crate::domain::repositories::{
        MockEntryRepository, MockHabitRepository, MockImportJobRepository,
    };
    use crate::infrastructure::cache::NullCache;
    use std::sync::Mutex;

    fn habit(id: &str) -> Habit {
        Habit {
            id: id.to_string(),
            user_id: "u_1".to_string(),
            name: "Run".to_string(),
            description: None,
            habit_type: HabitType::Binary,
            frequency: Frequency {
                frequency_type: FrequencyType::Daily,
                times_per_period: 1,
            },
            target: Target {
                value: 1,
                unit: "sessions".to_string(),
            },
            status: HabitStatus::Ongoing,
            is_archived: false,
            end_date: None,
            milestone: None,
            automation_source: AutomationSource::None,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
            last_completed_at_utc: None,
        }
    }

    fn job(content: &str) -> EntryImportJob {
        EntryImportJob {
            id: "ei_1".to_string(),
            user_id: "u_1".to_string(),
            status: ImportJobStatus::Pending,
            file_name: "entries.csv".to_string(),
            file_content: content.as_bytes().to_vec(),
            total_records: 0,
            processed_records: 0,
            successful_records: 0,
            failed_records: 0,
            errors: vec![],
            created_at_utc: Utc::now(),
            completed_at_utc: None,
        }
    }

    fn to_entry(new: NewEntry) -> Entry {
        Entry {
            id: new.id,
            habit_id: new.habit_id,
            user_id: new.user_id,
            value: new.value,
            notes: new.notes,
            source: new.source,
            external_id: new.external_id,
            is_archived: false,
            date: new.date,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
        }
    }

    fn service(
        jobs: MockImportJobRepository,
        habits: MockHabitRepository,
        entries: MockEntryRepository,
    ) -> (ImportService, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(4);
        let svc = ImportService::new(
            Arc::new(jobs),
            Arc::new(habits),
            Arc::new(entries),
            Arc::new(NullCache),
            tx,
            LinkBuilder::new("http://localhost:5000"),
        );
        (svc, rx)
    }

    fn recording_jobs(
        content: &'static str,
        updates: Arc<Mutex<Vec<ImportJobProgress>>>,
    ) -> MockImportJobRepository {
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_for_processing()
            .returning(move |_| Ok(Some(job(content))));
        jobs.expect_update_progress().returning(move |_, p| {
            updates.lock().unwrap().push(p);
            Ok(())
        });
        jobs
    }

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload("a.csv", b"").is_err());
        assert!(validate_upload("a.txt", b"x").is_err());
        assert!(validate_upload("A.CSV", b"x").is_ok());
        assert!(validate_upload("a.csv", &vec![b'x'; MAX_IMPORT_FILE_BYTES + 1]).is_err());
    }

    #[test]
    fn test_parse_row_defaults_value() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let row = CsvRow {
            habit_id: "h_1".to_string(),
            date: "2025-03-09".to_string(),
            value: Some(String::new()),
            notes: Some("  ".to_string()),
        };
        let entry = parse_row(row, "u_1", today).unwrap();
        assert_eq!(entry.value, 1);
        assert_eq!(entry.notes, None);
        assert_eq!(entry.source, EntrySource::FileImport);
    }

    #[test]
    fn test_parse_row_rejects_bad_values() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let row = |date: &str, value: &str| CsvRow {
            habit_id: "h_1".to_string(),
            date: date.to_string(),
            value: Some(value.to_string()),
            notes: None,
        };
        assert!(parse_row(row("2025-03-11", "1"), "u_1", today).is_err());
        assert!(parse_row(row("10/03/2025", "1"), "u_1", today).is_err());
        assert!(parse_row(row("2025-03-09", "-2"), "u_1", today).is_err());
        assert!(parse_row(row("2025-03-09", "abc"), "u_1", today).is_err());
    }

    #[tokio::test]
    async fn test_create_job_enqueues() {
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_create().returning(|new| {
            let mut created = job("");
            created.id = new.id;
            created.file_content = new.file_content;
            Ok(created)
        });
        let (svc, mut rx) = service(jobs, MockHabitRepository::new(), MockEntryRepository::new());

        let dto = svc
            .create_job("u_1", "entries.csv", b"habit_id,date\n".to_vec())
            .await
            .unwrap();
        assert_eq!(dto.status, ImportJobStatus::Pending);
        assert_eq!(rx.recv().await, Some(dto.id));
    }

    #[tokio::test]
    async fn test_process_records_row_failures() {
        const CSV: &str = "habit_id,date,value,notes\n\
                           h_1,2020-01-01,5,ok\n\
                           h_missing,2020-01-02,1,\n\
                           h_1,not-a-date,1,\n\
                           h_1,2020-01-03,,\n";

        let updates = Arc::new(Mutex::new(Vec::new()));
        let jobs = recording_jobs(CSV, updates.clone());
        let mut habits = MockHabitRepository::new();
        habits
            .expect_find_by_id()
            .returning(|_, id| Ok((id == "h_1").then(|| habit(id))));
        let mut entries = MockEntryRepository::new();
        entries
            .expect_create_batch()
            .withf(|batch| batch.len() == 2 && batch[1].value == 1)
            .times(1)
            .returning(|batch| Ok(batch.into_iter().map(to_entry).collect()));

        let (svc, _rx) = service(jobs, habits, entries);
        svc.process("ei_1").await.unwrap();

        let updates = updates.lock().unwrap();
        assert_eq!(updates[0].status, ImportJobStatus::Processing);
        let last = updates.last().unwrap();
        assert_eq!(last.status, ImportJobStatus::Completed);
        assert_eq!(last.total_records, 4);
        assert_eq!(last.successful_records, 2);
        assert_eq!(last.failed_records, 2);
        assert!(last.errors[0].starts_with("row 2:"));
        assert!(last.errors[1].starts_with("row 3:"));
        assert!(last.completed_at_utc.is_some());
    }

    #[tokio::test]
    async fn test_process_missing_columns_fails_job() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let jobs = recording_jobs("name,when\nx,y\n", updates.clone());
        let mut entries = MockEntryRepository::new();
        entries.expect_create_batch().times(0);

        let (svc, _rx) = service(jobs, MockHabitRepository::new(), entries);
        svc.process("ei_1").await.unwrap();

        let last = updates.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.status, ImportJobStatus::Failed);
        assert_eq!(last.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_process_repository_error_fails_job() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let jobs = recording_jobs("habit_id,date\nh_1,2020-01-01\n", updates.clone());
        let mut habits = MockHabitRepository::new();
        habits
            .expect_find_by_id()
            .returning(|_, _| Err(AppError::internal("Database error", json!({}))));
        let mut entries = MockEntryRepository::new();
        entries.expect_create_batch().times(0);

        let (svc, _rx) = service(jobs, habits, entries);
        svc.process("ei_1").await.unwrap();

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        let last = updates.last().unwrap();
        assert_eq!(last.status, ImportJobStatus::Failed);
        assert!(last.errors[0].starts_with("import aborted"));
        assert!(last.completed_at_utc.is_some());
    }

    #[tokio::test]
    async fn test_process_skips_finished_job() {
        let mut jobs = MockImportJobRepository::new();
        jobs.expect_find_for_processing().returning(|_| {
            let mut done = job("habit_id,date\n");
            done.status = ImportJobStatus::Completed;
            Ok(Some(done))
        });
        jobs.expect_update_progress().times(0);

        let (svc, _rx) = service(jobs, MockHabitRepository::new(), MockEntryRepository::new());
        svc.process("ei_1").await.unwrap();
    }
}
