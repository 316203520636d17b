//! Replay protection for retried `POST` requests.
//!
//! A client that sends `Idempotency-Key: <uuid>` gets the first successful
//! response replayed for every retry with the same key, so a timed-out
//! request can be retried without creating a duplicate. A retry that arrives
//! while the first request is still running gets `409 Conflict`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, HttpBody, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::infrastructure::cache::{get_typed, set_typed};
use crate::state::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Stored responses are replayed for this long.
pub const IDEMPOTENCY_TTL_SECONDS: u64 = 24 * 60 * 60;

const MAX_STORED_BODY_BYTES: usize = 1024 * 1024;

/// Keys claimed by a request that has not finished yet.
#[derive(Debug, Default)]
pub struct InFlightKeys {
    keys: Mutex<HashSet<String>>,
}

impl InFlightKeys {
    /// Claims `key`, or returns `None` when another request holds it.
    pub fn claim(self: &Arc<Self>, key: &str) -> Option<InFlightClaim> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.insert(key.to_string()).then(|| InFlightClaim {
            owner: Arc::clone(self),
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key when dropped, including when the request is cancelled.
#[derive(Debug)]
pub struct InFlightClaim {
    owner: Arc<InFlightKeys>,
    key: String,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.owner
            .keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredResponse {
    status: u16,
    content_type: Option<String>,
    location: Option<String>,
    body: String,
}

impl StoredResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);

        let headers = response.headers_mut();
        if let Some(v) = self.content_type.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(header::CONTENT_TYPE, v);
        }
        if let Some(v) = self.location.and_then(|v| HeaderValue::from_str(&v).ok()) {
            headers.insert(header::LOCATION, v);
        }
        response
    }
}

fn header_string(response: &Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn fits_store(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_STORED_BODY_BYTES as u64)
}

/// Parses the `Idempotency-Key` header, if present.
///
/// # Errors
///
/// Returns [`AppError::Validation`] when the header is not a UUID.
pub fn idempotency_key(req: &Request) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = req.headers().get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    raw.to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| {
            AppError::bad_request(
                "Idempotency-Key header must be a valid UUID",
                json!({ "header": "Idempotency-Key" }),
            )
        })
}

/// Replays or records `POST` responses keyed by user and idempotency key.
///
/// Runs after [`crate::api::middleware::auth::require_member`]. Only 2xx
/// responses are stored; failures can be retried with the same key. Bodies
/// without a known size up to [`MAX_STORED_BODY_BYTES`] pass through unstored.
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.method() != Method::POST {
        return Ok(next.run(req).await);
    }
    let Some(key) = idempotency_key(&req)? else {
        return Ok(next.run(req).await);
    };
    let Some(CurrentUser(user_id)) = req.extensions().get::<CurrentUser>().cloned() else {
        return Ok(next.run(req).await);
    };

    let cache_key = format!("idempotency:{user_id}:{key}");
    if let Some(stored) = get_typed::<StoredResponse>(st.idempotency.as_ref(), &cache_key).await
    {
        tracing::debug!(user_id, %key, "Replaying idempotent response");
        return Ok(stored.into_response());
    }

    let Some(_claim) = st.in_flight.claim(&cache_key) else {
        return Err(AppError::conflict(
            "A request with this Idempotency-Key is still being processed",
            json!({ "header": "Idempotency-Key" }),
        ));
    };

    // The first request may have finished between the lookup and the claim.
    if let Some(stored) = get_typed::<StoredResponse>(st.idempotency.as_ref(), &cache_key).await
    {
        return Ok(stored.into_response());
    }

    let response = next.run(req).await;
    if !response.status().is_success() || !fits_store(response.body()) {
        return Ok(response);
    }

    let status = response.status();
    let content_type = header_string(&response, header::CONTENT_TYPE);
    let location = header_string(&response, header::LOCATION);
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_STORED_BODY_BYTES).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to buffer response body");
        AppError::internal("Failed to read response body", json!({}))
    })?;

    let stored = StoredResponse {
        status: status.as_u16(),
        content_type,
        location,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    };
    set_typed(st.idempotency.as_ref(), &cache_key, &stored).await;

    Ok(Response::from_parts(parts, Body::from(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: Option<&str>) -> Request {
        let mut builder = Request::builder().method(Method::POST).uri("/api/entries");
        if let Some(key) = key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_missing_key_is_none() {
        assert_eq!(idempotency_key(&request(None)).unwrap(), None);
    }

    #[test]
    fn test_uuid_key_is_parsed() {
        let key = "0190c3a8-7f8e-7b7a-9c55-3c8d2f1e0a11";
        assert_eq!(
            idempotency_key(&request(Some(key))).unwrap(),
            Some(Uuid::parse_str(key).unwrap())
        );
    }

    #[test]
    fn test_non_uuid_key_is_rejected() {
        let err = idempotency_key(&request(Some("retry-1"))).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let keys = Arc::new(InFlightKeys::default());

        let claim = keys.claim("idempotency:1:a").unwrap();
        assert!(keys.claim("idempotency:1:a").is_none());
        assert!(keys.claim("idempotency:1:b").is_some());
        assert!(keys.contains("idempotency:1:a"));

        drop(claim);
        assert!(!keys.contains("idempotency:1:a"));
        assert!(keys.claim("idempotency:1:a").is_some());
    }

    #[test]
    fn test_fits_store() {
        assert!(fits_store(&Body::from("{}")));
        assert!(fits_store(&Body::from(vec![b'x'; MAX_STORED_BODY_BYTES])));
        assert!(!fits_store(&Body::from(vec![b'x'; MAX_STORED_BODY_BYTES + 1])));
    }

    #[test]
    fn test_stored_response_restores_headers() {
        let response = StoredResponse {
            status: 201,
            content_type: Some("application/json".to_string()),
            location: Some("/api/entries/e_1".to_string()),
            body: "{}".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/api/entries/e_1");
    }
}
