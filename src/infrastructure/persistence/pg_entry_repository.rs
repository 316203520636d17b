//! PostgreSQL implementation of entry repository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::entities::{
    DailyEntryCount, Entry, EntryChanges, EntryFilter, EntrySource, NewEntry,
};
use crate::domain::repositories::EntryRepository;
use crate::error::AppError;

use super::decode_code;

const ENTRY_COLUMNS: &str = "id, habit_id, user_id, value, notes, source, external_id, \
     is_archived, date, created_at_utc, updated_at_utc";

#[derive(FromRow)]
struct EntryRow {
    id: String,
    habit_id: String,
    user_id: String,
    value: i32,
    notes: Option<String>,
    source: i32,
    external_id: Option<String>,
    is_archived: bool,
    date: NaiveDate,
    created_at_utc: DateTime<Utc>,
    updated_at_utc: Option<DateTime<Utc>>,
}

impl TryFrom<EntryRow> for Entry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Entry {
            source: decode_code::<EntrySource>(row.source)?,
            id: row.id,
            habit_id: row.habit_id,
            user_id: row.user_id,
            value: row.value,
            notes: row.notes,
            external_id: row.external_id,
            is_archived: row.is_archived,
            date: row.date,
            created_at_utc: row.created_at_utc,
            updated_at_utc: row.updated_at_utc,
        })
    }
}

#[derive(FromRow)]
struct DailyCountRow {
    date: NaiveDate,
    count: i64,
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: &str, filter: &EntryFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id.to_string());

    if let Some(habit_id) = &filter.habit_id {
        qb.push(" AND habit_id = ").push_bind(habit_id.clone());
    }
    if let Some(from) = filter.from_date {
        qb.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = filter.to_date {
        qb.push(" AND date <= ").push_bind(to);
    }
    if let Some(source) = filter.source {
        qb.push(" AND source = ").push_bind(i32::from(source));
    }
    if let Some(is_archived) = filter.is_archived {
        qb.push(" AND is_archived = ").push_bind(is_archived);
    }
}

async fn insert_entry(conn: &mut PgConnection, new_entry: &NewEntry) -> Result<Entry, AppError> {
    let row: EntryRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO entries (id, habit_id, user_id, value, notes, source, external_id, date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {ENTRY_COLUMNS}
        "#
    ))
    .bind(&new_entry.id)
    .bind(&new_entry.habit_id)
    .bind(&new_entry.user_id)
    .bind(new_entry.value)
    .bind(&new_entry.notes)
    .bind(i32::from(new_entry.source))
    .bind(&new_entry.external_id)
    .bind(new_entry.date)
    .fetch_one(&mut *conn)
    .await?;

    row.try_into()
}

async fn touch_habits(conn: &mut PgConnection, habit_ids: Vec<String>) -> Result<(), AppError> {
    sqlx::query("UPDATE habits SET last_completed_at_utc = NOW() WHERE id = ANY($1)")
        .bind(habit_ids)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub struct PgEntryRepository {
    pool: Arc<PgPool>,
}

impl PgEntryRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn create(&self, new_entry: NewEntry) -> Result<Entry, AppError> {
        let mut tx = self.pool.begin().await?;

        let entry = insert_entry(&mut tx, &new_entry).await?;
        touch_habits(&mut tx, vec![entry.habit_id.clone()]).await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn create_batch(&self, new_entries: Vec<NewEntry>) -> Result<Vec<Entry>, AppError> {
        if new_entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        let mut created = Vec::with_capacity(new_entries.len());
        for new_entry in &new_entries {
            created.push(insert_entry(&mut tx, new_entry).await?);
        }

        let habit_ids: BTreeSet<String> = created.iter().map(|e| e.habit_id.clone()).collect();
        touch_habits(&mut tx, habit_ids.into_iter().collect()).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, user_id: &str, id: &str) -> Result<Option<Entry>, AppError> {
        let row: Option<EntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Entry::try_from).transpose()
    }

    async fn list(
        &self,
        user_id: &str,
        filter: &EntryFilter,
        order_by: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Entry>, AppError> {
        let offset = super::offset_for(page, page_size)?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {ENTRY_COLUMNS} FROM entries"));
        push_filter(&mut qb, user_id, filter);
        qb.push(" ORDER BY ")
            .push(order_by)
            .push(" LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows: Vec<EntryRow> = qb
            .build_query_as()
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(Entry::try_from).collect()
    }

    async fn count(&self, user_id: &str, filter: &EntryFilter) -> Result<i64, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM entries");
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
        changes: EntryChanges,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE entries
            SET value = $3, notes = $4, updated_at_utc = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(changes.value)
        .bind(&changes.notes)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_archived(
        &self,
        user_id: &str,
        id: &str,
        archived: bool,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE entries
            SET is_archived = $3, updated_at_utc = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(archived)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn daily_counts(&self, user_id: &str) -> Result<Vec<DailyEntryCount>, AppError> {
        let rows: Vec<DailyCountRow> = sqlx::query_as(
            r#"
            SELECT date, COUNT(*) AS count
            FROM entries
            WHERE user_id = $1 AND NOT is_archived
            GROUP BY date
            ORDER BY date
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DailyEntryCount {
                date: r.date,
                count: r.count,
            })
            .collect())
    }

    async fn existing_external_ids(
        &self,
        external_ids: Vec<String>,
    ) -> Result<Vec<String>, AppError> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let found: Vec<String> =
            sqlx::query_scalar("SELECT external_id FROM entries WHERE external_id = ANY($1)")
                .bind(external_ids)
                .fetch_all(self.pool.as_ref())
                .await?;

        Ok(found)
    }
}
