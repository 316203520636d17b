//! DTOs for entry endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use crate::api::dto::pagination::PaginationParams;
use crate::domain::entities::{Entry, EntrySource};
use crate::utils::data_shaping::Shapeable;
use crate::utils::sorting::SortMapping;

pub const ENTRY_SORT_MAPPINGS: &[SortMapping] = &[
    SortMapping::new("date", "date"),
    SortMapping::new("value", "value"),
    SortMapping::new("createdAtUtc", "created_at_utc"),
    SortMapping::new("updatedAtUtc", "updated_at_utc"),
];

pub const ENTRY_DEFAULT_SORT: &str = "date desc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDto {
    pub id: String,
    pub habit_id: String,
    pub value: i32,
    pub notes: Option<String>,
    pub source: EntrySource,
    pub external_id: Option<String>,
    pub is_archived: bool,
    pub date: NaiveDate,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

impl Shapeable for EntryDto {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "habitId",
        "value",
        "notes",
        "source",
        "externalId",
        "isArchived",
        "date",
        "createdAtUtc",
        "updatedAtUtc",
    ];
}

impl From<Entry> for EntryDto {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            habit_id: entry.habit_id,
            value: entry.value,
            notes: entry.notes,
            source: entry.source,
            external_id: entry.external_id,
            is_archived: entry.is_archived,
            date: entry.date,
            created_at_utc: entry.created_at_utc,
            updated_at_utc: entry.updated_at_utc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryDto {
    #[validate(length(min = 1, message = "Habit id is required"))]
    pub habit_id: String,
    #[validate(range(min = 0, message = "Value must be greater than or equal to 0"))]
    pub value: i32,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEntryBatchDto {
    #[validate(
        length(min = 1, max = 20, message = "Batch must contain between 1 and 20 entries"),
        nested
    )]
    pub entries: Vec<CreateEntryDto>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateEntryDto {
    #[validate(range(min = 0, message = "Value must be greater than or equal to 0"))]
    pub value: i32,
    #[validate(length(max = 1000, message = "Notes cannot exceed 1000 characters"))]
    pub notes: Option<String>,
}

/// Query parameters for `GET /api/entries`.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesQuery {
    #[serde(default)]
    pub habit_id: Option<String>,
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub source: Option<i32>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStatDto {
    pub date: NaiveDate,
    pub count: i64,
}

/// Body of `GET /api/entries/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStatsDto {
    pub daily_stats: Vec<DailyStatDto>,
    pub total_entries: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
}
