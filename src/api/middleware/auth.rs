//! Bearer token authentication middleware.
//!
//! Authentication is split in two layers so the rate limiter can sit between
//! them and key on the caller's identity:
//!
//! 1. [`authenticate`] verifies the token, if any, and stores the [`Identity`]
//! 2. [`require_member`] rejects anonymous callers and callers without the
//!    `member` role, then resolves the application user as [`CurrentUser`]

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_auth::AuthBearer;

use crate::auth::{Identity, MEMBER_ROLE};
use crate::error::AppError;
use crate::state::AppState;

/// The application user id of the authenticated caller.
///
/// Inserted by [`require_member`]; extracting it on a route without that
/// layer is a 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// Verifies the `Authorization: Bearer <token>` header when present.
///
/// A valid token adds its [`Identity`] to the request extensions. Missing or
/// invalid tokens pass through untouched; [`require_member`] turns them into 401.
pub async fn authenticate(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    if let Ok(AuthBearer(token)) = AuthBearer::from_request_parts(&mut parts, &()).await {
        match st.jwt.validate(&token) {
            Ok(identity) => {
                parts.extensions.insert(identity);
            }
            Err(e) => tracing::debug!(error = %e, "Rejected bearer token"),
        }
    }

    next.run(Request::from_parts(parts, body)).await
}

/// Requires an authenticated caller holding the `member` role.
///
/// # Errors
///
/// - `401 Unauthorized` if no valid bearer token was presented
/// - `403 Forbidden` if the token lacks the `member` role
///
/// 401 responses carry `WWW-Authenticate: Bearer` per RFC 6750.
pub async fn require_member(
    State(st): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| AppError::unauthorized("Authorization header is missing or invalid"))?;

    if !identity.has_role(MEMBER_ROLE) {
        return Err(AppError::forbidden(format!(
            "The '{MEMBER_ROLE}' role is required"
        )));
    }

    let user_id = st.user_service.resolve(&identity).await?;
    req.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(req).await)
}
