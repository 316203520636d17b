//! DTOs for habit endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::Validate;

use crate::api::dto::pagination::PaginationParams;
use crate::domain::entities::{
    AutomationSource, Frequency, FrequencyType, Habit, HabitStatus, HabitType, Target,
};
use crate::utils::data_shaping::Shapeable;
use crate::utils::sorting::SortMapping;

/// Sortable habit properties.
pub const HABIT_SORT_MAPPINGS: &[SortMapping] = &[
    SortMapping::new("name", "name"),
    SortMapping::new("description", "description"),
    SortMapping::new("type", "habit_type"),
    SortMapping::new("frequency.type", "frequency_type"),
    SortMapping::new("frequency.timesPerPeriod", "frequency_times_per_period"),
    SortMapping::new("target.value", "target_value"),
    SortMapping::new("target.unit", "target_unit"),
    SortMapping::new("status", "status"),
    SortMapping::new("endDate", "end_date"),
    SortMapping::new("createdAtUtc", "created_at_utc"),
    SortMapping::new("updatedAtUtc", "updated_at_utc"),
    SortMapping::new("lastCompletedAtUtc", "last_completed_at_utc"),
];

pub const HABIT_DEFAULT_SORT: &str = "createdAtUtc desc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyDto {
    #[serde(rename = "type")]
    pub frequency_type: FrequencyType,
    #[validate(range(min = 1, message = "Frequency must be greater than 0"))]
    pub times_per_period: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TargetDto {
    #[validate(range(min = 1, message = "Target value must be greater than 0"))]
    pub value: i32,
    #[validate(length(min = 1, max = 100, message = "Unit must be between 1 and 100 characters"))]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneDto {
    pub target: i32,
    pub current: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateMilestoneDto {
    #[validate(range(min = 1, message = "Milestone target must be greater than 0"))]
    pub target: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    pub frequency: FrequencyDto,
    pub target: TargetDto,
    pub status: HabitStatus,
    pub is_archived: bool,
    pub end_date: Option<NaiveDate>,
    pub milestone: Option<MilestoneDto>,
    pub automation_source: AutomationSource,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
    pub last_completed_at_utc: Option<DateTime<Utc>>,
}

impl Shapeable for HabitDto {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "type",
        "frequency",
        "target",
        "status",
        "isArchived",
        "endDate",
        "milestone",
        "automationSource",
        "createdAtUtc",
        "updatedAtUtc",
        "lastCompletedAtUtc",
    ];
}

impl From<Habit> for HabitDto {
    fn from(habit: Habit) -> Self {
        Self {
            id: habit.id,
            name: habit.name,
            description: habit.description,
            habit_type: habit.habit_type,
            frequency: FrequencyDto {
                frequency_type: habit.frequency.frequency_type,
                times_per_period: habit.frequency.times_per_period,
            },
            target: TargetDto {
                value: habit.target.value,
                unit: habit.target.unit,
            },
            status: habit.status,
            is_archived: habit.is_archived,
            end_date: habit.end_date,
            milestone: habit.milestone.map(|m| MilestoneDto {
                target: m.target,
                current: m.current,
            }),
            automation_source: habit.automation_source,
            created_at_utc: habit.created_at_utc,
            updated_at_utc: habit.updated_at_utc,
            last_completed_at_utc: habit.last_completed_at_utc,
        }
    }
}

/// A habit together with the names of its tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitWithTagsDto {
    #[serde(flatten)]
    pub habit: HabitDto,
    pub tags: Vec<String>,
}

impl Shapeable for HabitWithTagsDto {
    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "description",
        "type",
        "frequency",
        "target",
        "status",
        "isArchived",
        "endDate",
        "milestone",
        "automationSource",
        "createdAtUtc",
        "updatedAtUtc",
        "lastCompletedAtUtc",
        "tags",
    ];
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateHabitDto {
    #[validate(length(min = 3, max = 100, message = "Name must be between 3 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    #[validate(nested)]
    pub frequency: FrequencyDto,
    #[validate(nested)]
    pub target: TargetDto,
    pub end_date: Option<NaiveDate>,
    #[validate(nested)]
    pub milestone: Option<UpdateMilestoneDto>,
    #[serde(default = "no_automation")]
    pub automation_source: AutomationSource,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHabitDto {
    #[validate(length(min = 3, max = 100, message = "Name must be between 3 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    #[validate(nested)]
    pub frequency: FrequencyDto,
    #[validate(nested)]
    pub target: TargetDto,
    pub end_date: Option<NaiveDate>,
    #[validate(nested)]
    pub milestone: Option<UpdateMilestoneDto>,
    #[serde(default = "no_automation")]
    pub automation_source: AutomationSource,
}

fn no_automation() -> AutomationSource {
    AutomationSource::None
}

/// Fields shared by create and update requests, used for cross-field checks.
pub struct HabitInput<'a> {
    pub habit_type: HabitType,
    pub frequency: &'a FrequencyDto,
    pub target: &'a TargetDto,
    pub end_date: Option<NaiveDate>,
}

impl CreateHabitDto {
    pub fn input(&self) -> HabitInput<'_> {
        HabitInput {
            habit_type: self.habit_type,
            frequency: &self.frequency,
            target: &self.target,
            end_date: self.end_date,
        }
    }
}

impl UpdateHabitDto {
    pub fn input(&self) -> HabitInput<'_> {
        HabitInput {
            habit_type: self.habit_type,
            frequency: &self.frequency,
            target: &self.target,
            end_date: self.end_date,
        }
    }
}

impl From<&FrequencyDto> for Frequency {
    fn from(dto: &FrequencyDto) -> Self {
        Frequency {
            frequency_type: dto.frequency_type,
            times_per_period: dto.times_per_period,
        }
    }
}

impl From<&TargetDto> for Target {
    fn from(dto: &TargetDto) -> Self {
        Target {
            value: dto.value,
            unit: dto.unit.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertHabitTagsDto {
    pub tag_ids: Vec<String>,
}

/// Query parameters for `GET /api/habits`.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitsQuery {
    /// Case-insensitive search in name and description.
    #[serde(default)]
    pub q: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, rename = "type")]
    pub habit_type: Option<i32>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub fields: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Query parameters for single-resource reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsQuery {
    #[serde(default)]
    pub fields: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_json() -> serde_json::Value {
        json!({
            "name": "Read books",
            "description": null,
            "type": 2,
            "frequency": { "type": 1, "timesPerPeriod": 1 },
            "target": { "value": 30, "unit": "pages" }
        })
    }

    #[test]
    fn test_create_dto_parses_and_validates() {
        let dto: CreateHabitDto = serde_json::from_value(create_json()).unwrap();
        assert_eq!(dto.habit_type, HabitType::Measurable);
        assert_eq!(dto.automation_source, AutomationSource::None);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_create_dto_field_rules() {
        let mut raw = create_json();
        raw["name"] = json!("ab");
        raw["frequency"]["timesPerPeriod"] = json!(0);
        raw["target"]["value"] = json!(0);
        raw["milestone"] = json!({ "target": 0 });

        let dto: CreateHabitDto = serde_json::from_value(raw).unwrap();
        let errors = dto.validate().unwrap_err();
        let fields = errors.errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("frequency"));
        assert!(fields.contains_key("target"));
        assert!(fields.contains_key("milestone"));
    }

    #[test]
    fn test_unknown_enum_code_is_rejected() {
        let mut raw = create_json();
        raw["type"] = json!(9);
        assert!(serde_json::from_value::<CreateHabitDto>(raw).is_err());
    }

    #[test]
    fn test_habit_with_tags_flattens() {
        let habit = HabitDto {
            id: "h_1".to_string(),
            name: "Run".to_string(),
            description: None,
            habit_type: HabitType::Binary,
            frequency: FrequencyDto {
                frequency_type: FrequencyType::Daily,
                times_per_period: 1,
            },
            target: TargetDto {
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
        };
        let json = serde_json::to_value(HabitWithTagsDto {
            habit,
            tags: vec!["health".to_string()],
        })
        .unwrap();

        assert_eq!(json["id"], "h_1");
        assert_eq!(json["frequency"]["timesPerPeriod"], 1);
        assert_eq!(json["isArchived"], false);
        assert_eq!(json["tags"][0], "health");
    }
}
