//! Entry recording, listing and statistics.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};
use validator::Validate;

use crate::api::dto::entries::{
    CreateEntryBatchDto, CreateEntryDto, DailyStatDto, ENTRY_DEFAULT_SORT, ENTRY_SORT_MAPPINGS,
    EntriesQuery, EntryDto, EntryStatsDto, UpdateEntryDto,
};
use crate::api::dto::pagination::PaginationResult;
use crate::application::services::habit_service::evict_user_habits;
use crate::application::services::query::{check_fields, order_by, parse_code, shape_item};
use crate::domain::entities::{
    DailyEntryCount, EntryChanges, EntryFilter, EntrySource, NewEntry, new_id,
};
use crate::domain::repositories::{EntryRepository, HabitRepository};
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::utils::hateoas::{LinkBuilder, LinkDto, rel};

pub struct EntryService {
    entries: Arc<dyn EntryRepository>,
    habits: Arc<dyn HabitRepository>,
    cache: Arc<dyn CacheService>,
    links: LinkBuilder,
}

impl EntryService {
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        habits: Arc<dyn HabitRepository>,
        cache: Arc<dyn CacheService>,
        links: LinkBuilder,
    ) -> Self {
        Self {
            entries,
            habits,
            cache,
            links,
        }
    }

    /// Lists the user's entries.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for unknown sort or shaping fields, an
    /// unknown source code, out-of-range paging or `fromDate` after `toDate`.
    pub async fn list(
        &self,
        user_id: &str,
        query: &EntriesQuery,
        hateoas: bool,
    ) -> Result<PaginationResult<Value>, AppError> {
        check_fields::<EntryDto>(query.fields.as_deref())?;
        let order = order_by(query.sort.as_deref(), ENTRY_SORT_MAPPINGS, ENTRY_DEFAULT_SORT)?;
        let (page, page_size) = query.pagination.resolve()?;

        if let (Some(from), Some(to)) = (query.from_date, query.to_date)
            && from > to
        {
            return Err(AppError::bad_request(
                "fromDate must not be after toDate",
                json!({ "fromDate": from, "toDate": to }),
            ));
        }

        let filter = EntryFilter {
            habit_id: query.habit_id.clone(),
            from_date: query.from_date,
            to_date: query.to_date,
            source: parse_code::<EntrySource>("source", query.source)?,
            is_archived: query.is_archived,
        };

        let entries = self
            .entries
            .list(user_id, &filter, &order, page, page_size)
            .await?;
        let total = self.entries.count(user_id, &filter).await?;

        let fields = query.fields.as_deref();
        let data = entries
            .into_iter()
            .map(|entry| {
                let links =
                    hateoas.then(|| self.entry_links(&entry.id, entry.is_archived, fields));
                shape_item(&EntryDto::from(entry), fields, links)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = PaginationResult::new(data, page, page_size, total);
        if hateoas {
            result.links = Some(self.collection_links(
                query,
                page,
                page_size,
                result.has_previous_page,
                result.has_next_page,
            ));
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
        check_fields::<EntryDto>(fields)?;

        let entry = self
            .entries
            .find_by_id(user_id, id)
            .await?
            .ok_or_else(|| entry_not_found(id))?;

        let links = hateoas.then(|| self.entry_links(id, entry.is_archived, fields));
        shape_item(&EntryDto::from(entry), fields, links)
    }

    /// Records a manual entry.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the habit is not the user's or the
    /// date lies in the future.
    pub async fn create(&self, user_id: &str, dto: CreateEntryDto) -> Result<EntryDto, AppError> {
        dto.validate()?;
        let new_entry = self.prepare(user_id, dto, Utc::now().date_naive()).await?;

        let entry = self.entries.create(new_entry).await?;
        record_created(EntrySource::Manual, 1);
        evict_user_habits(self.cache.as_ref(), user_id).await;

        Ok(EntryDto::from(entry))
    }

    /// Records up to 20 manual entries atomically.
    pub async fn create_batch(
        &self,
        user_id: &str,
        dto: CreateEntryBatchDto,
    ) -> Result<Vec<EntryDto>, AppError> {
        dto.validate()?;
        let today = Utc::now().date_naive();

        let mut new_entries = Vec::with_capacity(dto.entries.len());
        for entry in dto.entries {
            new_entries.push(self.prepare(user_id, entry, today).await?);
        }

        let created = self.entries.create_batch(new_entries).await?;
        record_created(EntrySource::Manual, created.len() as u64);
        evict_user_habits(self.cache.as_ref(), user_id).await;

        Ok(created.into_iter().map(EntryDto::from).collect())
    }

    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        dto: UpdateEntryDto,
    ) -> Result<(), AppError> {
        dto.validate()?;

        let changes = EntryChanges {
            value: dto.value,
            notes: dto.notes,
        };
        if !self.entries.update(user_id, id, changes).await? {
            return Err(entry_not_found(id));
        }
        Ok(())
    }

    pub async fn archive(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.set_archived(user_id, id, true).await
    }

    pub async fn unarchive(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.set_archived(user_id, id, false).await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        if !self.entries.delete(user_id, id).await? {
            return Err(entry_not_found(id));
        }
        Ok(())
    }

    /// Daily counts and streaks over the user's non-archived entries.
    pub async fn stats(&self, user_id: &str) -> Result<EntryStatsDto, AppError> {
        let daily = self.entries.daily_counts(user_id).await?;
        Ok(build_stats(daily, Utc::now().date_naive()))
    }

    /// Links attached to a single entry; archived entries offer `un-archive`.
    pub fn entry_links(&self, id: &str, is_archived: bool, fields: Option<&str>) -> Vec<LinkDto> {
        let path = format!("/api/entries/{id}");
        let toggle = if is_archived {
            self.links
                .simple(&format!("{path}/un-archive"), rel::UN_ARCHIVE, "PUT")
        } else {
            self.links
                .simple(&format!("{path}/archive"), rel::ARCHIVE, "PUT")
        };

        vec![
            self.links.link(
                &path,
                &[("fields", fields.map(str::to_string))],
                rel::SELF,
                "GET",
            ),
            self.links.simple(&path, rel::UPDATE, "PUT"),
            self.links.simple(&path, rel::DELETE, "DELETE"),
            toggle,
        ]
    }

    fn collection_links(
        &self,
        query: &EntriesQuery,
        page: i64,
        page_size: i64,
        has_previous: bool,
        has_next: bool,
    ) -> Vec<LinkDto> {
        let params = |page: i64| {
            vec![
                ("habitId", query.habit_id.clone()),
                ("fromDate", query.from_date.map(|d| d.to_string())),
                ("toDate", query.to_date.map(|d| d.to_string())),
                ("source", query.source.map(|s| s.to_string())),
                ("isArchived", query.is_archived.map(|a| a.to_string())),
                ("sort", query.sort.clone()),
                ("fields", query.fields.clone()),
                ("page", Some(page.to_string())),
                ("page_size", Some(page_size.to_string())),
            ]
        };

        let mut links = vec![
            self.links
                .link("/api/entries", &params(page), rel::SELF, "GET"),
            self.links.simple("/api/entries", rel::CREATE, "POST"),
        ];
        if has_previous {
            links.push(self.links.link(
                "/api/entries",
                &params(page - 1),
                rel::PREVIOUS_PAGE,
                "GET",
            ));
        }
        if has_next {
            links.push(
                self.links
                    .link("/api/entries", &params(page + 1), rel::NEXT_PAGE, "GET"),
            );
        }
        links
    }

    async fn prepare(
        &self,
        user_id: &str,
        dto: CreateEntryDto,
        today: NaiveDate,
    ) -> Result<NewEntry, AppError> {
        if dto.date > today {
            return Err(AppError::bad_request(
                "Entry date cannot be in the future",
                json!({ "date": dto.date }),
            ));
        }

        if self.habits.find_by_id(user_id, &dto.habit_id).await?.is_none() {
            return Err(AppError::bad_request(
                "Habit does not exist",
                json!({ "habitId": dto.habit_id }),
            ));
        }

        Ok(NewEntry {
            id: new_id("e"),
            habit_id: dto.habit_id,
            user_id: user_id.to_string(),
            value: dto.value,
            notes: dto.notes,
            source: EntrySource::Manual,
            external_id: None,
            date: dto.date,
        })
    }

    async fn set_archived(&self, user_id: &str, id: &str, archived: bool) -> Result<(), AppError> {
        if !self.entries.set_archived(user_id, id, archived).await? {
            return Err(entry_not_found(id));
        }
        Ok(())
    }
}

fn entry_not_found(id: &str) -> AppError {
    AppError::not_found("Entry not found", json!({ "id": id }))
}

/// Increments the entry creation counter.
pub fn record_created(source: EntrySource, count: u64) {
    metrics::counter!("dev_habit.entries.created", "source" => source.as_str()).increment(count);
}

pub fn build_stats(daily: Vec<DailyEntryCount>, today: NaiveDate) -> EntryStatsDto {
    let total_entries = daily.iter().map(|d| d.count).sum();
    let dates: BTreeSet<NaiveDate> = daily
        .iter()
        .filter(|d| d.count > 0)
        .map(|d| d.date)
        .collect();
    let (current_streak, longest_streak) = compute_streaks(&dates, today);

    EntryStatsDto {
        daily_stats: daily
            .into_iter()
            .map(|d| DailyStatDto {
                date: d.date,
                count: d.count,
            })
            .collect(),
        total_entries,
        current_streak,
        longest_streak,
    }
}

/// Returns `(current, longest)` runs of consecutive days in `dates`.
///
/// The current streak ends today, or yesterday when today has no entry yet.
pub fn compute_streaks(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> (i64, i64) {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &date in dates {
        run = match previous {
            Some(p) if p.succ_opt() == Some(date) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }

    let mut current = 0;
    let mut day = if dates.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    while let Some(d) = day.filter(|d| dates.contains(d)) {
        current += 1;
        day = d.pred_opt();
    }

    (current, longest)
}

/// Keeps the first occurrence of each external id and drops ids already stored.
pub fn without_known_external_ids(entries: Vec<NewEntry>, known: &[String]) -> Vec<NewEntry> {
    let mut seen: HashSet<String> = known.iter().cloned().collect();
    entries
        .into_iter()
        .filter(|e| match &e.external_id {
            Some(id) => seen.insert(id.clone()),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        AutomationSource, Entry, Frequency, FrequencyType, Habit, HabitStatus, HabitType, Target,
    };
    use crate::domain::repositories::{MockEntryRepository, MockHabitRepository};
    use crate::infrastructure::cache::NullCache;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn dates(list: &[&str]) -> BTreeSet<NaiveDate> {
        list.iter().map(|s| date(s)).collect()
    }

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

    fn entry_from(new: NewEntry) -> Entry {
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

    fn create_dto(habit_id: &str, date: NaiveDate) -> CreateEntryDto {
        CreateEntryDto {
            habit_id: habit_id.to_string(),
            value: 1,
            notes: None,
            date,
        }
    }

    fn service(entries: MockEntryRepository, habits: MockHabitRepository) -> EntryService {
        EntryService::new(
            Arc::new(entries),
            Arc::new(habits),
            Arc::new(NullCache),
            LinkBuilder::new("http://localhost:5000"),
        )
    }

    #[test]
    fn test_streak_counts_back_from_today() {
        let today = date("2025-03-10");
        let d = dates(&["2025-03-08", "2025-03-09", "2025-03-10"]);
        assert_eq!(compute_streaks(&d, today), (3, 3));
    }

    #[test]
    fn test_streak_starts_yesterday_when_today_is_empty() {
        let today = date("2025-03-10");
        let d = dates(&["2025-03-07", "2025-03-08", "2025-03-09"]);
        assert_eq!(compute_streaks(&d, today), (3, 3));
    }

    #[test]
    fn test_broken_streak() {
        let today = date("2025-03-10");
        let d = dates(&[
            "2025-02-01",
            "2025-02-02",
            "2025-02-03",
            "2025-02-04",
            "2025-03-05",
            "2025-03-06",
        ]);
        assert_eq!(compute_streaks(&d, today), (0, 4));
    }

    #[test]
    fn test_streaks_empty() {
        assert_eq!(compute_streaks(&BTreeSet::new(), date("2025-03-10")), (0, 0));
    }

    #[test]
    fn test_streak_spans_month_boundary() {
        let today = date("2025-03-01");
        let d = dates(&["2025-02-27", "2025-02-28", "2025-03-01"]);
        assert_eq!(compute_streaks(&d, today), (3, 3));
    }

    #[test]
    fn test_build_stats_totals() {
        let daily = vec![
            DailyEntryCount {
                date: date("2025-03-09"),
                count: 2,
            },
            DailyEntryCount {
                date: date("2025-03-10"),
                count: 3,
            },
        ];
        let stats = build_stats(daily, date("2025-03-10"));
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.daily_stats.len(), 2);
    }

    #[test]
    fn test_without_known_external_ids() {
        let make = |ext: Option<&str>| NewEntry {
            id: new_id("e"),
            habit_id: "h_1".to_string(),
            user_id: "u_1".to_string(),
            value: 1,
            notes: None,
            source: EntrySource::Automation,
            external_id: ext.map(str::to_string),
            date: date("2025-03-10"),
        };
        let entries = vec![make(Some("1")), make(Some("2")), make(Some("2")), make(None)];

        let kept = without_known_external_ids(entries, &["1".to_string()]);
        let ids: Vec<_> = kept.iter().map(|e| e.external_id.clone()).collect();
        assert_eq!(ids, vec![Some("2".to_string()), None]);
    }

    #[tokio::test]
    async fn test_create_entry_for_unknown_habit() {
        let mut habits = MockHabitRepository::new();
        habits.expect_find_by_id().returning(|_, _| Ok(None));
        let mut entries = MockEntryRepository::new();
        entries.expect_create().times(0);

        let err = service(entries, habits)
            .create("u_1", create_dto("h_x", Utc::now().date_naive()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_entry_in_future_is_rejected() {
        let tomorrow = Utc::now().date_naive().succ_opt().unwrap();
        let err = service(MockEntryRepository::new(), MockHabitRepository::new())
            .create("u_1", create_dto("h_1", tomorrow))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_entry_success() {
        let mut habits = MockHabitRepository::new();
        habits
            .expect_find_by_id()
            .returning(|_, id| Ok(Some(habit(id))));
        let mut entries = MockEntryRepository::new();
        entries
            .expect_create()
            .withf(|e| e.source == EntrySource::Manual && e.id.starts_with("e_"))
            .times(1)
            .returning(|e| Ok(entry_from(e)));

        let dto = service(entries, habits)
            .create("u_1", create_dto("h_1", Utc::now().date_naive()))
            .await
            .unwrap();
        assert_eq!(dto.habit_id, "h_1");
        assert_eq!(dto.source, EntrySource::Manual);
    }

    #[tokio::test]
    async fn test_batch_fails_as_a_whole() {
        let mut habits = MockHabitRepository::new();
        habits.expect_find_by_id().returning(|_, id| {
            Ok((id == "h_1").then(|| habit(id)))
        });
        let mut entries = MockEntryRepository::new();
        entries.expect_create_batch().times(0);

        let today = Utc::now().date_naive();
        let dto = CreateEntryBatchDto {
            entries: vec![create_dto("h_1", today), create_dto("h_2", today)],
        };
        assert!(service(entries, habits).create_batch("u_1", dto).await.is_err());
    }

    #[tokio::test]
    async fn test_archive_missing_entry() {
        let mut entries = MockEntryRepository::new();
        entries
            .expect_set_archived()
            .withf(|_, _, archived| *archived)
            .returning(|_, _, _| Ok(false));

        let err = service(entries, MockHabitRepository::new())
            .archive("u_1", "e_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_rejects_inverted_date_range() {
        let query = EntriesQuery {
            from_date: Some(date("2025-03-10")),
            to_date: Some(date("2025-03-01")),
            ..Default::default()
        };
        let err = service(MockEntryRepository::new(), MockHabitRepository::new())
            .list("u_1", &query, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_entry_links_toggle_archive_rel() {
        let svc = service(MockEntryRepository::new(), MockHabitRepository::new());
        let active = svc.entry_links("e_1", false, None);
        assert_eq!(active[3].rel, "archive");
        assert_eq!(active[3].href, "http://localhost:5000/api/entries/e_1/archive");

        let archived = svc.entry_links("e_1", true, None);
        assert_eq!(archived[3].rel, "un-archive");
    }
}
