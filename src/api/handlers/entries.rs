//! Handlers for entry endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};

use crate::api::dto::entries::{
    CreateEntryBatchDto, CreateEntryDto, EntriesQuery, EntryStatsDto, UpdateEntryDto,
};
use crate::api::dto::habits::FieldsQuery;
use crate::api::dto::pagination::CollectionResult;
use crate::api::handlers::{Hateoas, created, negotiated};
use crate::api::middleware::auth::CurrentUser;
use crate::application::services::query::shape_item;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the caller's entries.
///
/// # Endpoint
///
/// `GET /api/entries`
///
/// # Query Parameters
///
/// - `habitId`, `fromDate`, `toDate` (`YYYY-MM-DD`), `source`, `isArchived`
/// - `sort`, `fields`, `page`, `page_size`
///
/// # Errors
///
/// Returns 400 when `fromDate` is after `toDate`, or for bad sort, fields or paging.
pub async fn list_entries_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Query(query): Query<EntriesQuery>,
) -> Result<Response, AppError> {
    let result = state.entry_service.list(&user_id, &query, hateoas).await?;
    Ok(negotiated(result, hateoas))
}

/// `GET /api/entries/{id}`
pub async fn get_entry_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Path(id): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Response, AppError> {
    let entry = state
        .entry_service
        .get(&user_id, &id, query.fields.as_deref(), hateoas)
        .await?;
    Ok(negotiated(entry, hateoas))
}

/// Per-day counts, total and streaks over the caller's non-archived entries.
///
/// # Endpoint
///
/// `GET /api/entries/stats`
pub async fn entry_stats_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<EntryStatsDto>, AppError> {
    Ok(Json(state.entry_service.stats(&user_id).await?))
}

/// Records a manual entry.
///
/// # Endpoint
///
/// `POST /api/entries`
///
/// Send `Idempotency-Key: <uuid>` to make retries safe.
///
/// # Errors
///
/// - 400 if the date is in the future or the habit doesn't exist
pub async fn create_entry_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Json(dto): Json<CreateEntryDto>,
) -> Result<Response, AppError> {
    let entry = state.entry_service.create(&user_id, dto).await?;
    let links = hateoas.then(|| {
        state
            .entry_service
            .entry_links(&entry.id, entry.is_archived, None)
    });
    created(&format!("/api/entries/{}", entry.id), &entry, links)
}

/// Records several entries atomically.
///
/// # Endpoint
///
/// `POST /api/entries/batch`
///
/// Either every entry is stored or none is.
pub async fn create_entry_batch_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Json(dto): Json<CreateEntryBatchDto>,
) -> Result<(StatusCode, Response), AppError> {
    let entries = state.entry_service.create_batch(&user_id, dto).await?;

    let data = entries
        .iter()
        .map(|entry| {
            let links = hateoas.then(|| {
                state
                    .entry_service
                    .entry_links(&entry.id, entry.is_archived, None)
            });
            shape_item(entry, None, links)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((
        StatusCode::CREATED,
        negotiated(CollectionResult { data, links: None }, hateoas),
    ))
}

/// `PUT /api/entries/{id}`
pub async fn update_entry_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateEntryDto>,
) -> Result<StatusCode, AppError> {
    state.entry_service.update(&user_id, &id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/entries/{id}/archive`
pub async fn archive_entry_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.entry_service.archive(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/entries/{id}/un-archive`
pub async fn unarchive_entry_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.entry_service.unarchive(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/entries/{id}`
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.entry_service.delete(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
