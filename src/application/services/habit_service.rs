//! Habit management service.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value, json};
use validator::Validate;

use crate::api::dto::habits::{
    CreateHabitDto, HABIT_DEFAULT_SORT, HABIT_SORT_MAPPINGS, HabitDto, HabitInput, HabitWithTagsDto,
    HabitsQuery, UpdateHabitDto,
};
use crate::api::dto::pagination::PaginationResult;
use crate::application::services::query::{
    check_fields, fields_key, normalize_search, order_by, parse_code, shape_item,
};
use crate::domain::entities::{
    FrequencyType, HabitChanges, HabitFilter, HabitStatus, HabitType, NewHabit, new_id,
};
use crate::domain::repositories::{HabitRepository, TagRepository};
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, evict, get_typed, set_typed};
use crate::utils::hateoas::{LinkBuilder, LinkDto, rel};
use crate::utils::sorting;

/// Cache prefix covering every habit list of a user.
pub fn habits_prefix(user_id: &str) -> String {
    format!("habits:{user_id}:")
}

/// Cache prefix covering every cached representation of one habit.
pub fn habit_prefix(user_id: &str, habit_id: &str) -> String {
    format!("habit:{user_id}:{habit_id}:")
}

/// Evicts every cached habit payload of a user.
///
/// Called after changes that alter habits indirectly: entries move
/// `lastCompletedAtUtc` and tag renames change embedded tag names.
pub async fn evict_user_habits(cache: &dyn CacheService, user_id: &str) {
    evict(cache, &habits_prefix(user_id)).await;
    evict(cache, &format!("habit:{user_id}:")).await;
}

/// Service for creating, listing and editing habits.
///
/// Reads are cached per user, per query and per representation
/// (fields + HATEOAS); every write evicts the affected keys.
pub struct HabitService {
    habits: Arc<dyn HabitRepository>,
    tags: Arc<dyn TagRepository>,
    cache: Arc<dyn CacheService>,
    links: LinkBuilder,
}

impl HabitService {
    pub fn new(
        habits: Arc<dyn HabitRepository>,
        tags: Arc<dyn TagRepository>,
        cache: Arc<dyn CacheService>,
        links: LinkBuilder,
    ) -> Self {
        Self {
            habits,
            tags,
            cache,
            links,
        }
    }

    /// Lists the user's habits.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for unknown sort or shaping fields,
    /// unknown type/status codes and out-of-range paging.
    pub async fn list(
        &self,
        user_id: &str,
        query: &HabitsQuery,
        hateoas: bool,
    ) -> Result<PaginationResult<Value>, AppError> {
        sorting::validate(query.sort.as_deref(), HABIT_SORT_MAPPINGS)
            .map_err(|e| AppError::bad_request(e.to_string(), json!({ "sort": query.sort })))?;
        check_fields::<HabitDto>(query.fields.as_deref())?;
        let (page, page_size) = query.pagination.resolve()?;

        let filter = HabitFilter {
            search: normalize_search(query.q.as_deref()),
            habit_type: parse_code::<HabitType>("type", query.habit_type)?,
            status: parse_code::<HabitStatus>("status", query.status)?,
        };

        metrics::counter!("dev_habit.habits.requests", "user_id" => user_id.to_string())
            .increment(1);

        let cache_key = format!(
            "{}{}:{}:{}:{}:{}:{}:{}:{}",
            habits_prefix(user_id),
            filter.search.as_deref().unwrap_or_default(),
            query.habit_type.map(|t| t.to_string()).unwrap_or_default(),
            query.status.map(|s| s.to_string()).unwrap_or_default(),
            query.sort.as_deref().unwrap_or_default().trim().to_lowercase(),
            page,
            page_size,
            fields_key(query.fields.as_deref()),
            hateoas,
        );

        if let Some(cached) = get_typed(self.cache.as_ref(), &cache_key).await {
            return Ok(cached);
        }

        let order = order_by(query.sort.as_deref(), HABIT_SORT_MAPPINGS, HABIT_DEFAULT_SORT)?;
        let habits = self
            .habits
            .list(user_id, &filter, &order, page, page_size)
            .await?;
        let total = self.habits.count(user_id, &filter).await?;

        let fields = query.fields.as_deref();
        let data = habits
            .into_iter()
            .map(|habit| {
                let links = hateoas.then(|| self.habit_links(&habit.id, fields));
                shape_item(&HabitDto::from(habit), fields, links)
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

        set_typed(self.cache.as_ref(), &cache_key, &result).await;
        Ok(result)
    }

    /// Returns one habit with its tag names.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user has no such habit.
    pub async fn get(
        &self,
        user_id: &str,
        id: &str,
        fields: Option<&str>,
        hateoas: bool,
    ) -> Result<Value, AppError> {
        check_fields::<HabitWithTagsDto>(fields)?;

        let cache_key = format!(
            "{}{}:{}",
            habit_prefix(user_id, id),
            fields_key(fields),
            hateoas
        );
        if let Some(cached) = get_typed(self.cache.as_ref(), &cache_key).await {
            return Ok(cached);
        }

        let habit = self
            .habits
            .find_by_id(user_id, id)
            .await?
            .ok_or_else(|| habit_not_found(id))?;
        let tags = self.habits.tag_names(&habit.id).await?;

        let dto = HabitWithTagsDto {
            habit: HabitDto::from(habit),
            tags,
        };
        let links = hateoas.then(|| self.habit_links(id, fields));
        let shaped = shape_item(&dto, fields, links)?;

        set_typed(self.cache.as_ref(), &cache_key, &shaped).await;
        Ok(shaped)
    }

    /// Creates a habit for the user.
    ///
    /// New habits are `Ongoing`, not archived, with milestone progress at zero.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the request breaks a field rule or
    /// the unit does not fit the habit type.
    pub async fn create(
        &self,
        user_id: &str,
        mut dto: CreateHabitDto,
    ) -> Result<HabitDto, AppError> {
        dto.name = dto.name.trim().to_string();
        dto.validate()?;
        validate_habit_input(&dto.input(), Utc::now().date_naive())?;

        let new_habit = NewHabit {
            id: new_id("h"),
            user_id: user_id.to_string(),
            name: dto.name,
            description: dto.description,
            habit_type: dto.habit_type,
            frequency: (&dto.frequency).into(),
            target: (&dto.target).into(),
            end_date: dto.end_date,
            milestone_target: dto.milestone.map(|m| m.target),
            automation_source: dto.automation_source,
        };

        let habit = self.habits.create(new_habit).await?;
        evict(self.cache.as_ref(), &habits_prefix(user_id)).await;

        tracing::info!(user_id, habit_id = %habit.id, "Habit created");
        Ok(HabitDto::from(habit))
    }

    /// Replaces a habit's editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user has no such habit.
    pub async fn update(
        &self,
        user_id: &str,
        id: &str,
        mut dto: UpdateHabitDto,
    ) -> Result<(), AppError> {
        dto.name = dto.name.trim().to_string();
        dto.validate()?;
        validate_habit_input(&dto.input(), Utc::now().date_naive())?;

        let changes = HabitChanges {
            name: dto.name,
            description: dto.description,
            habit_type: dto.habit_type,
            frequency: (&dto.frequency).into(),
            target: (&dto.target).into(),
            end_date: dto.end_date,
            milestone_target: dto.milestone.map(|m| m.target),
            automation_source: dto.automation_source,
        };

        if !self.habits.update(user_id, id, changes).await? {
            return Err(habit_not_found(id));
        }

        self.evict_habit(user_id, id).await;
        Ok(())
    }

    /// Deletes a habit together with its entries.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the user has no such habit.
    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        if !self.habits.delete(user_id, id).await? {
            return Err(habit_not_found(id));
        }

        self.evict_habit(user_id, id).await;
        tracing::info!(user_id, habit_id = id, "Habit deleted");
        Ok(())
    }

    /// Makes `tag_ids` the habit's complete tag set.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the habit doesn't exist and
    /// [`AppError::Validation`] if any tag id is unknown to the user.
    pub async fn upsert_tags(
        &self,
        user_id: &str,
        habit_id: &str,
        tag_ids: Vec<String>,
    ) -> Result<(), AppError> {
        self.habits
            .find_by_id(user_id, habit_id)
            .await?
            .ok_or_else(|| habit_not_found(habit_id))?;

        let requested: BTreeSet<String> = tag_ids.into_iter().collect();

        let existing: BTreeSet<String> = self
            .tags
            .existing_ids(user_id, requested.iter().cloned().collect())
            .await?
            .into_iter()
            .collect();
        if existing.len() != requested.len() {
            let unknown: Vec<&String> = requested.difference(&existing).collect();
            return Err(AppError::bad_request(
                "One or more tag IDs is invalid",
                json!({ "tag_ids": unknown }),
            ));
        }

        let current: BTreeSet<String> = self
            .habits
            .tag_ids(habit_id)
            .await?
            .into_iter()
            .collect();
        if current == requested {
            return Ok(());
        }

        self.habits
            .replace_tags(habit_id, requested.into_iter().collect())
            .await?;
        self.evict_habit(user_id, habit_id).await;
        Ok(())
    }

    /// Detaches one tag from a habit.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the habit doesn't exist or the tag
    /// isn't attached to it.
    pub async fn remove_tag(
        &self,
        user_id: &str,
        habit_id: &str,
        tag_id: &str,
    ) -> Result<(), AppError> {
        self.habits
            .find_by_id(user_id, habit_id)
            .await?
            .ok_or_else(|| habit_not_found(habit_id))?;

        if !self.habits.remove_tag(habit_id, tag_id).await? {
            return Err(AppError::not_found(
                "Tag is not attached to this habit",
                json!({ "habit_id": habit_id, "tag_id": tag_id }),
            ));
        }

        self.evict_habit(user_id, habit_id).await;
        Ok(())
    }

    /// Links attached to a single habit representation.
    pub fn habit_links(&self, id: &str, fields: Option<&str>) -> Vec<LinkDto> {
        let path = format!("/api/habits/{id}");
        vec![
            self.links.link(
                &path,
                &[("fields", fields.map(str::to_string))],
                rel::SELF,
                "GET",
            ),
            self.links.simple(&path, rel::UPDATE, "PUT"),
            self.links.simple("/api/habits", rel::CREATE, "POST"),
            self.links.simple(&path, rel::DELETE, "DELETE"),
            self.links
                .simple(&format!("{path}/tags"), rel::UPSERT_TAGS, "PUT"),
        ]
    }

    fn collection_links(
        &self,
        query: &HabitsQuery,
        page: i64,
        page_size: i64,
        has_previous: bool,
        has_next: bool,
    ) -> Vec<LinkDto> {
        let params = |page: i64| {
            vec![
                ("q", query.q.clone()),
                ("type", query.habit_type.map(|t| t.to_string())),
                ("status", query.status.map(|s| s.to_string())),
                ("sort", query.sort.clone()),
                ("fields", query.fields.clone()),
                ("page", Some(page.to_string())),
                ("page_size", Some(page_size.to_string())),
            ]
        };

        let mut links = vec![
            self.links.link("/api/habits", &params(page), rel::SELF, "GET"),
            self.links.simple("/api/habits", rel::CREATE, "POST"),
        ];
        if has_previous {
            links.push(
                self.links
                    .link("/api/habits", &params(page - 1), rel::PREVIOUS_PAGE, "GET"),
            );
        }
        if has_next {
            links.push(
                self.links
                    .link("/api/habits", &params(page + 1), rel::NEXT_PAGE, "GET"),
            );
        }
        links
    }

    async fn evict_habit(&self, user_id: &str, habit_id: &str) {
        evict(self.cache.as_ref(), &habit_prefix(user_id, habit_id)).await;
        evict(self.cache.as_ref(), &habits_prefix(user_id)).await;
    }
}

fn habit_not_found(id: &str) -> AppError {
    AppError::not_found("Habit not found", json!({ "id": id }))
}

/// Rules spanning several fields of a create or update request.
pub fn validate_habit_input(input: &HabitInput<'_>, today: NaiveDate) -> Result<(), AppError> {
    let mut errors = Map::new();

    if input.habit_type == HabitType::None {
        errors.insert("type".into(), json!("Habit type must be set"));
    }
    if input.frequency.frequency_type == FrequencyType::None {
        errors.insert("frequency.type".into(), json!("Frequency type must be set"));
    }
    if !input.habit_type.allows_unit(&input.target.unit) {
        errors.insert(
            "target.unit".into(),
            json!(format!(
                "Unit '{}' is not allowed for this habit type; allowed: {}",
                input.target.unit,
                input.habit_type.allowed_units().join(", ")
            )),
        );
    }
    if input.end_date.is_some_and(|end| end <= today) {
        errors.insert("endDate".into(), json!("End date must be in the future"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::bad_request("Validation failed", Value::Object(errors)))
    }
}
