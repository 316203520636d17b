//! Handlers for GitHub integration endpoints.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::api::dto::github::{
    GitHubEvent, GitHubEventsQuery, GitHubUserProfile, StoreGitHubAccessTokenDto,
};
use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_EVENTS_PER_PAGE: u32 = 30;

/// Stores (or replaces) the caller's GitHub personal access token.
///
/// # Endpoint
///
/// `PUT /api/github/personal-access-token`
///
/// ```json
/// { "accessToken": "ghp_...", "expiresInDays": 30 }
/// ```
///
/// The token is encrypted before it is written to the database.
pub async fn store_token_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(dto): Json<StoreGitHubAccessTokenDto>,
) -> Result<StatusCode, AppError> {
    state.github_service.store_token(&user_id, dto).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/github/personal-access-token`
pub async fn revoke_token_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<StatusCode, AppError> {
    state.github_service.revoke_token(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The GitHub profile behind the stored token.
///
/// # Endpoint
///
/// `GET /api/github/profile`
///
/// # Errors
///
/// - 404 if no valid token is stored
/// - 502 if GitHub rejects the token or is unavailable
pub async fn github_profile_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<GitHubUserProfile>, AppError> {
    Ok(Json(state.github_service.profile(&user_id).await?))
}

/// Recent public events of the GitHub user behind the stored token.
///
/// # Endpoint
///
/// `GET /api/github/events?page=1&per_page=30`
pub async fn github_events_handler(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<GitHubEventsQuery>,
) -> Result<Json<Vec<GitHubEvent>>, AppError> {
    let events = state
        .github_service
        .events(
            &user_id,
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_EVENTS_PER_PAGE),
        )
        .await?;
    Ok(Json(events))
}
