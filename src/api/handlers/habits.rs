//! Handlers for habit endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};

use crate::api::dto::habits::{
    CreateHabitDto, FieldsQuery, HabitsQuery, UpdateHabitDto, UpsertHabitTagsDto,
};
use crate::api::handlers::{Hateoas, created, negotiated};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Lists the caller's habits.
///
/// # Endpoint
///
/// `GET /api/habits`
///
/// # Query Parameters
///
/// - `q` - Case-insensitive search in name and description
/// - `type` / `status` - Integer codes
/// - `sort` - e.g. `name desc,createdAtUtc`
/// - `fields` - Comma-separated camelCase properties to return
/// - `page` / `page_size` - Paging (defaults 1 and 10)
///
/// # Errors
///
/// Returns 400 for unknown sort or shaping fields and out-of-range paging.
pub async fn list_habits_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Query(query): Query<HabitsQuery>,
) -> Result<Response, AppError> {
    let result = state.habit_service.list(&user_id, &query, hateoas).await?;
    Ok(negotiated(result, hateoas))
}

/// Returns one habit with its tag names.
///
/// # Endpoint
///
/// `GET /api/habits/{id}`
///
/// # Errors
///
/// Returns 404 if the caller has no habit with this id.
pub async fn get_habit_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Path(id): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Response, AppError> {
    let habit = state
        .habit_service
        .get(&user_id, &id, query.fields.as_deref(), hateoas)
        .await?;
    Ok(negotiated(habit, hateoas))
}

/// Creates a habit.
///
/// # Endpoint
///
/// `POST /api/habits`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Morning run",
///   "type": 2,
///   "frequency": { "type": 1, "timesPerPeriod": 1 },
///   "target": { "value": 30, "unit": "minutes" },
///   "milestone": { "target": 100 }
/// }
/// ```
///
/// # Errors
///
/// Returns 400 if validation fails or the unit doesn't fit the habit type.
pub async fn create_habit_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Json(dto): Json<CreateHabitDto>,
) -> Result<Response, AppError> {
    let habit = state.habit_service.create(&user_id, dto).await?;
    let links = hateoas.then(|| state.habit_service.habit_links(&habit.id, None));
    created(&format!("/api/habits/{}", habit.id), &habit, links)
}

/// Replaces a habit's editable fields.
///
/// # Endpoint
///
/// `PUT /api/habits/{id}`
///
/// # Errors
///
/// - 400 if validation fails
/// - 404 if the habit doesn't exist
pub async fn update_habit_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<UpdateHabitDto>,
) -> Result<StatusCode, AppError> {
    state.habit_service.update(&user_id, &id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes a habit with its entries and tag links.
///
/// # Endpoint
///
/// `DELETE /api/habits/{id}`
pub async fn delete_habit_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.habit_service.delete(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Sets the habit's tags to exactly the given ids.
///
/// # Endpoint
///
/// `PUT /api/habits/{id}/tags`
///
/// ```json
/// { "tagIds": ["t_0190...", "t_0191..."] }
/// ```
///
/// # Errors
///
/// - 400 if any tag id is unknown
/// - 404 if the habit doesn't exist
pub async fn upsert_habit_tags_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<UpsertHabitTagsDto>,
) -> Result<StatusCode, AppError> {
    state
        .habit_service
        .upsert_tags(&user_id, &id, dto.tag_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Unlinks one tag from a habit.
///
/// # Endpoint
///
/// `DELETE /api/habits/{id}/tags/{tag_id}`
pub async fn remove_habit_tag_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((id, tag_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .habit_service
        .remove_tag(&user_id, &id, &tag_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
