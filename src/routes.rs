//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET /health` - Health check: database and cache (public)
//! - `/api/*`      - REST API (bearer token with the `member` role)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **CORS** - Configured SPA origins, with credentials
//! - **API chain** - see [`crate::api::middleware`]
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{auth, etag, idempotency, rate_limit, tracing};
use crate::state::AppState;
use axum::http::{HeaderValue, header};
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// CORS policy for the configured origins.
///
/// Methods and headers are mirrored from the preflight, since wildcards are
/// not allowed together with credentials.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                ::tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .expose_headers([
            header::LOCATION,
            header::ETAG,
            header::RETRY_AFTER,
        ])
}

/// All routes and middleware, without path normalization.
///
/// Route layers run outermost first: `authenticate`, `rate_limit`,
/// `require_member`, `idempotency`, `etag`.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let api_router = api::routes::protected_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), etag::layer))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            idempotency::layer,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_member,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::layer,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(tracing::layer())
}

/// Constructs the application router with trailing slashes trimmed.
pub fn app_router(state: AppState, allowed_origins: &[String]) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state, allowed_origins))
}
