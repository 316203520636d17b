//! PostgreSQL implementation of habit repository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

use crate::domain::entities::{
    AutomationSource, Frequency, FrequencyType, Habit, HabitChanges, HabitFilter, HabitStatus,
    HabitType, Milestone, NewHabit, Target,
};
use crate::domain::repositories::HabitRepository;
use crate::error::AppError;
use crate::infrastructure::cache::escape_like;

use super::decode_code;

const HABIT_COLUMNS: &str = "id, user_id, name, description, habit_type, frequency_type, \
     frequency_times_per_period, target_value, target_unit, status, is_archived, end_date, \
     milestone_target, milestone_current, automation_source, created_at_utc, updated_at_utc, \
     last_completed_at_utc";

#[derive(FromRow)]
struct HabitRow {
    id: String,
    user_id: String,
    name: String,
    description: Option<String>,
    habit_type: i32,
    frequency_type: i32,
    frequency_times_per_period: i32,
    target_value: i32,
    target_unit: String,
    status: i32,
    is_archived: bool,
    end_date: Option<NaiveDate>,
    milestone_target: Option<i32>,
    milestone_current: Option<i32>,
    automation_source: i32,
    created_at_utc: DateTime<Utc>,
    updated_at_utc: Option<DateTime<Utc>>,
    last_completed_at_utc: Option<DateTime<Utc>>,
}

impl TryFrom<HabitRow> for Habit {
    type Error = AppError;

    fn try_from(row: HabitRow) -> Result<Self, Self::Error> {
        Ok(Habit {
            habit_type: decode_code::<HabitType>(row.habit_type)?,
            frequency: Frequency {
                frequency_type: decode_code::<FrequencyType>(row.frequency_type)?,
                times_per_period: row.frequency_times_per_period,
            },
            target: Target {
                value: row.target_value,
                unit: row.target_unit,
            },
            status: decode_code::<HabitStatus>(row.status)?,
            milestone: row.milestone_target.map(|target| Milestone {
                target,
                current: row.milestone_current.unwrap_or(0),
            }),
            automation_source: decode_code::<AutomationSource>(row.automation_source)?,
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            is_archived: row.is_archived,
            end_date: row.end_date,
            created_at_utc: row.created_at_utc,
            updated_at_utc: row.updated_at_utc,
            last_completed_at_utc: row.last_completed_at_utc,
        })
    }
}

fn into_habits(rows: Vec<HabitRow>) -> Result<Vec<Habit>, AppError> {
    rows.into_iter().map(Habit::try_from).collect()
}

/// Appends the `WHERE` clause shared by `list` and `count`.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: &str, filter: &HabitFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id.to_string());

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (LOWER(name) LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR LOWER(description) LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
    if let Some(habit_type) = filter.habit_type {
        qb.push(" AND habit_type = ").push_bind(i32::from(habit_type));
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(i32::from(status));
    }
}

pub struct PgHabitRepository {
    pool: Arc<PgPool>,
}

impl PgHabitRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HabitRepository for PgHabitRepository {
    async fn create(&self, new_habit: NewHabit) -> Result<Habit, AppError> {
        let row: HabitRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO habits (
                id, user_id, name, description, habit_type, frequency_type,
                frequency_times_per_period, target_value, target_unit, status, is_archived,
                end_date, milestone_target, milestone_current, automation_source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11, $12, $13, $14)
            RETURNING {HABIT_COLUMNS}
            "#
        ))
        .bind(&new_habit.id)
        .bind(&new_habit.user_id)
        .bind(&new_habit.name)
        .bind(&new_habit.description)
        .bind(i32::from(new_habit.habit_type))
        .bind(i32::from(new_habit.frequency.frequency_type))
        .bind(new_habit.frequency.times_per_period)
        .bind(new_habit.target.value)
        .bind(&new_habit.target.unit)
        .bind(i32::from(HabitStatus::Ongoing))
        .bind(new_habit.end_date)
        .bind(new_habit.milestone_target)
        .bind(new_habit.milestone_target.map(|_| 0))
        .bind(i32::from(new_habit.automation_source))
        .fetch_one(self.pool.as_ref())
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, user_id: &str, id: &str) -> Result<Option<Habit>, AppError> {
        let row: Option<HabitRow> = sqlx::query_as(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Habit::try_from).transpose()
    }

    async fn list(
        &self,
        user_id: &str,
        filter: &HabitFilter,
        order_by: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Habit>, AppError> {
        let offset = super::offset_for(page, page_size)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {HABIT_COLUMNS} FROM habits"));
        push_filter(&mut qb, user_id, filter);
        qb.push(" ORDER BY ")
            .push(order_by)
            .push(" LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<HabitRow> = qb
            .build_query_as()
            .fetch_all(self.pool.as_ref())
            .await?;

        into_habits(rows)
    }

    async fn count(&self, user_id: &str, filter: &HabitFilter) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM habits");
        push_filter(&mut qb, user_id, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        changes: HabitChanges,
    ) -> Result<bool, AppError> {
        // Milestone progress survives a target change; a removed milestone clears it.
        let result = sqlx::query(
            r#"
            UPDATE habits SET
                name = $3,
                description = $4,
                habit_type = $5,
                frequency_type = $6,
                frequency_times_per_period = $7,
                target_value = $8,
                target_unit = $9,
                end_date = $10,
                milestone_target = $11,
                milestone_current = CASE
                    WHEN $11::integer IS NULL THEN NULL
                    ELSE COALESCE(milestone_current, 0)
                END,
                automation_source = $12,
                updated_at_utc = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(i32::from(changes.habit_type))
        .bind(i32::from(changes.frequency.frequency_type))
        .bind(changes.frequency.times_per_period)
        .bind(changes.target.value)
        .bind(&changes.target.unit)
        .bind(changes.end_date)
        .bind(changes.milestone_target)
        .bind(i32::from(changes.automation_source))
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM habits WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn tag_names(&self, habit_id: &str) -> Result<Vec<String>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT t.name
            FROM habit_tags ht
            JOIN tags t ON t.id = ht.tag_id
            WHERE ht.habit_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(habit_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(names)
    }

    async fn tag_ids(&self, habit_id: &str) -> Result<Vec<String>, AppError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT tag_id FROM habit_tags WHERE habit_id = $1")
                .bind(habit_id)
                .fetch_all(self.pool.as_ref())
                .await?;

        Ok(ids)
    }

    async fn replace_tags(&self, habit_id: &str, tag_ids: Vec<String>) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM habit_tags WHERE habit_id = $1")
            .bind(habit_id)
            .execute(&mut *tx)
            .await?;

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO habit_tags (habit_id, tag_id)
                SELECT $1, tag_id FROM UNNEST($2::varchar[]) AS tag_id
                "#,
            )
            .bind(habit_id)
            .bind(tag_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_tag(&self, habit_id: &str, tag_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM habit_tags WHERE habit_id = $1 AND tag_id = $2")
            .bind(habit_id)
            .bind(tag_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_automated(&self) -> Result<Vec<Habit>, AppError> {
        let rows: Vec<HabitRow> = sqlx::query_as(&format!(
            r#"
            SELECT {HABIT_COLUMNS} FROM habits
            WHERE automation_source <> 0 AND NOT is_archived
            ORDER BY user_id, id
            "#
        ))
        .fetch_all(self.pool.as_ref())
        .await?;

        into_habits(rows)
    }
}
