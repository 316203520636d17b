//! Habit entity and its value types.

use chrono::{DateTime, NaiveDate, Utc};

use super::coded_enum;

coded_enum! {
    /// Whether a habit is simply done or measured in units.
    pub enum HabitType {
        None = 0,
        Binary = 1,
        Measurable = 2,
    }
}

coded_enum! {
    pub enum FrequencyType {
        None = 0,
        Daily = 1,
        Weekly = 2,
        Monthly = 3,
    }
}

coded_enum! {
    pub enum HabitStatus {
        None = 0,
        Ongoing = 1,
        Completed = 2,
    }
}

coded_enum! {
    /// External source that records entries for a habit automatically.
    pub enum AutomationSource {
        None = 0,
        GitHub = 1,
    }
}

impl HabitType {
    /// Units a habit of this type may be measured in.
    pub fn allowed_units(self) -> &'static [&'static str] {
        match self {
            HabitType::Measurable => &[
                "minutes", "hours", "steps", "km", "cal", "pages", "books", "tasks", "sessions",
            ],
            HabitType::Binary => &["sessions", "tasks"],
            HabitType::None => &[],
        }
    }

    /// Case-insensitive check of `unit` against [`Self::allowed_units`].
    pub fn allows_unit(self, unit: &str) -> bool {
        let unit = unit.trim().to_lowercase();
        self.allowed_units().iter().any(|u| *u == unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub frequency_type: FrequencyType,
    pub times_per_period: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub value: i32,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub target: i32,
    pub current: i32,
}

/// A habit owned by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub habit_type: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub status: HabitStatus,
    pub is_archived: bool,
    pub end_date: Option<NaiveDate>,
    pub milestone: Option<Milestone>,
    pub automation_source: AutomationSource,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
    pub last_completed_at_utc: Option<DateTime<Utc>>,
}

impl Habit {
    pub fn is_automated(&self) -> bool {
        self.automation_source != AutomationSource::None
    }
}

/// Input data for creating a habit.
///
/// New habits start `Ongoing`, not archived, with milestone progress at zero.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub habit_type: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub end_date: Option<NaiveDate>,
    pub milestone_target: Option<i32>,
    pub automation_source: AutomationSource,
}

/// Full replacement of a habit's editable fields.
#[derive(Debug, Clone)]
pub struct HabitChanges {
    pub name: String,
    pub description: Option<String>,
    pub habit_type: HabitType,
    pub frequency: Frequency,
    pub target: Target,
    pub end_date: Option<NaiveDate>,
    pub milestone_target: Option<i32>,
    pub automation_source: AutomationSource,
}

/// Filters for listing a user's habits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitFilter {
    /// Lower-cased substring matched against name and description.
    pub search: Option<String>,
    pub habit_type: Option<HabitType>,
    pub status: Option<HabitStatus>,
}
