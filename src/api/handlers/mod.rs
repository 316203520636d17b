//! HTTP request handlers for API endpoints.
//!
//! Handlers extract the caller with [`CurrentUser`], delegate to the
//! application services and shape the HTTP response. Business rules live in
//! the services.
//!
//! # Modules
//!
//! - [`habits`] - Habit CRUD and tag links
//! - [`tags`] - Tag CRUD
//! - [`entries`] - Entry CRUD, batch creation, archiving and statistics
//! - [`imports`] - CSV import jobs
//! - [`users`] - Current user profile
//! - [`github`] - GitHub token storage and proxied GitHub reads
//! - [`health`] - Public health check
//!
//! [`CurrentUser`]: crate::api::middleware::auth::CurrentUser

pub mod entries;
pub mod github;
pub mod habits;
pub mod health;
pub mod imports;
pub mod tags;
pub mod users;

pub use health::health_handler;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::convert::Infallible;

use crate::application::services::query::shape_item;
use crate::error::AppError;
use crate::utils::hateoas::{HATEOAS_MEDIA_TYPE, LinkDto, wants_hateoas};

/// Whether the client asked for hypermedia links via `Accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hateoas(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for Hateoas {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let requested = parts
            .headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(wants_hateoas);
        Ok(Hateoas(requested))
    }
}

/// A JSON response whose `Content-Type` follows the negotiated representation.
pub fn negotiated<T: Serialize>(body: T, hateoas: bool) -> Response {
    let mut response = Json(body).into_response();
    if hateoas {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HATEOAS_MEDIA_TYPE),
        );
    }
    response
}

/// `201 Created` with a `Location` header and the new resource, with its
/// links when `links` is set.
pub fn created<T: Serialize>(
    location: &str,
    item: &T,
    links: Option<Vec<LinkDto>>,
) -> Result<Response, AppError> {
    let hateoas = links.is_some();
    let body = shape_item(item, None, links)?;

    let mut response = negotiated(body, hateoas);
    *response.status_mut() = StatusCode::CREATED;
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn hateoas_for(accept: Option<&str>) -> bool {
        let mut builder = Request::builder().uri("/api/habits");
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Hateoas::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn test_hateoas_negotiation() {
        assert!(!hateoas_for(None).await);
        assert!(!hateoas_for(Some("application/json")).await);
        assert!(hateoas_for(Some("application/vnd.dev-habit.hateoas+json")).await);
        assert!(
            hateoas_for(Some(
                "application/json, application/vnd.dev-habit.hateoas.v2+json;q=0.9"
            ))
            .await
        );
    }

    #[test]
    fn test_created_sets_location_and_content_type() {
        let response = created(
            "/api/tags/t_1",
            &serde_json::json!({ "id": "t_1" }),
            Some(vec![]),
        )
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/api/tags/t_1");
        assert_eq!(response.headers()[header::CONTENT_TYPE], HATEOAS_MEDIA_TYPE);
    }
}
