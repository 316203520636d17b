//! Handlers for user endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::api::dto::users::{UpdateProfileDto, UserDto};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

/// `GET /api/users/me`
pub async fn me_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<UserDto>, AppError> {
    Ok(Json(state.user_service.me(&user_id).await?))
}

/// Returns a user by id. Callers may only read themselves.
///
/// # Endpoint
///
/// `GET /api/users/{id}`
///
/// # Errors
///
/// Returns 403 when `id` is not the caller's own id.
pub async fn get_user_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    Ok(Json(state.user_service.get(&user_id, &id).await?))
}

/// `PUT /api/users/me/profile`
pub async fn update_profile_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(dto): Json<UpdateProfileDto>,
) -> Result<StatusCode, AppError> {
    state.user_service.update_profile(&user_id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}
