//! Handlers for tag endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};

use crate::api::dto::habits::FieldsQuery;
use crate::api::dto::tags::UpsertTagDto;
use crate::api::handlers::{Hateoas, created, negotiated};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// Lists all of the caller's tags, ordered by name.
///
/// # Endpoint
///
/// `GET /api/tags`
pub async fn list_tags_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Query(query): Query<FieldsQuery>,
) -> Result<Response, AppError> {
    let tags = state
        .tag_service
        .list(&user_id, query.fields.as_deref(), hateoas)
        .await?;
    Ok(negotiated(tags, hateoas))
}

/// `GET /api/tags/{id}`
pub async fn get_tag_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Path(id): Path<String>,
    Query(query): Query<FieldsQuery>,
) -> Result<Response, AppError> {
    let tag = state
        .tag_service
        .get(&user_id, &id, query.fields.as_deref(), hateoas)
        .await?;
    Ok(negotiated(tag, hateoas))
}

/// Creates a tag.
///
/// # Endpoint
///
/// `POST /api/tags`
///
/// # Errors
///
/// - 400 if the name is blank or too long
/// - 409 if the caller already has a tag with this name
pub async fn create_tag_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Hateoas(hateoas): Hateoas,
    Json(dto): Json<UpsertTagDto>,
) -> Result<Response, AppError> {
    let tag = state.tag_service.create(&user_id, dto).await?;
    let links = hateoas.then(|| state.tag_service.tag_links(&tag.id, None));
    created(&format!("/api/tags/{}", tag.id), &tag, links)
}

/// `PUT /api/tags/{id}`
pub async fn update_tag_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<UpsertTagDto>,
) -> Result<StatusCode, AppError> {
    state.tag_service.update(&user_id, &id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/tags/{id}`
pub async fn delete_tag_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.tag_service.delete(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
