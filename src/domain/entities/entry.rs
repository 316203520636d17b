//! Entry entity: one recorded completion of a habit.

use chrono::{DateTime, NaiveDate, Utc};

use super::coded_enum;

coded_enum! {
    /// How an entry was recorded.
    pub enum EntrySource {
        Manual = 0,
        Automation = 1,
        FileImport = 2,
    }
}

impl EntrySource {
    /// Label used for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            EntrySource::Manual => "manual",
            EntrySource::Automation => "automation",
            EntrySource::FileImport => "file_import",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    pub value: i32,
    pub notes: Option<String>,
    pub source: EntrySource,
    /// Identifier in the originating system; unique when present.
    pub external_id: Option<String>,
    pub is_archived: bool,
    pub date: NaiveDate,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    pub value: i32,
    pub notes: Option<String>,
    pub source: EntrySource,
    pub external_id: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct EntryChanges {
    pub value: i32,
    pub notes: Option<String>,
}

/// Filters for listing a user's entries. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub habit_id: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub source: Option<EntrySource>,
    pub is_archived: Option<bool>,
}

/// Number of non-archived entries recorded on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyEntryCount {
    pub date: NaiveDate,
    pub count: i64,
}
