//! Strong ETags for conditional reads and optimistic concurrency.
//!
//! - `GET` 200 responses carry `ETag: "<sha256 hex of body>"`; a matching
//!   `If-None-Match` turns the response into `304 Not Modified`
//! - `PUT`/`PATCH`/`DELETE` with `If-Match` are refused with `412` when the
//!   tag last served for that path differs
//!
//! Tags are remembered per user and path in memory for [`ETAG_TTL`], and at
//! most [`MAX_TRACKED_ETAGS`] of them are kept.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::api::middleware::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;

const MAX_TAGGED_BODY_BYTES: usize = 16 * 1024 * 1024;

/// How long a served tag is remembered for `If-Match` checks.
pub const ETAG_TTL: Duration = Duration::from_secs(60 * 60);

pub const MAX_TRACKED_ETAGS: usize = 100_000;

#[derive(Debug)]
struct Remembered {
    etag: String,
    served_at: Instant,
}

/// Last ETag served per `{user}:{path}`.
#[derive(Debug)]
pub struct ETagStore {
    tags: Mutex<HashMap<String, Remembered>>,
    ttl: Duration,
    capacity: usize,
}

impl Default for ETagStore {
    fn default() -> Self {
        Self::with_limits(ETAG_TTL, MAX_TRACKED_ETAGS)
    }
}

impl ETagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            tags: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.tags
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .filter(|r| r.served_at.elapsed() < self.ttl)
            .map(|r| r.etag.clone())
    }

    /// Remembers `etag`. When full, expired tags go first, then the oldest one.
    pub fn set(&self, key: String, etag: String) {
        let mut tags = self.tags.lock().unwrap_or_else(|e| e.into_inner());

        if !tags.contains_key(&key) && tags.len() >= self.capacity {
            let ttl = self.ttl;
            tags.retain(|_, r| r.served_at.elapsed() < ttl);
            if tags.len() >= self.capacity
                && let Some(oldest) = tags
                    .iter()
                    .min_by_key(|(_, r)| r.served_at)
                    .map(|(k, _)| k.clone())
            {
                tags.remove(&oldest);
            }
        }

        tags.insert(
            key,
            Remembered {
                etag,
                served_at: Instant::now(),
            },
        );
    }

    /// Drops expired tags. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let mut tags = self.tags.lock().unwrap_or_else(|e| e.into_inner());
        let before = tags.len();
        let ttl = self.ttl;
        tags.retain(|_, r| r.served_at.elapsed() < ttl);
        before - tags.len()
    }

    /// Forgets `key` and every ancestor path, so a change to
    /// `/api/entries/e_1/archive` also invalidates `/api/entries/e_1` and `/api/entries`.
    pub fn forget_with_ancestors(&self, key: &str) {
        let mut tags = self.tags.lock().unwrap_or_else(|e| e.into_inner());
        let mut current = key;
        loop {
            tags.remove(current);
            match current.rfind('/') {
                Some(pos) if pos > 0 => current = &current[..pos],
                _ => break,
            }
        }
    }
}

/// Quoted SHA-256 hex digest of `body`.
pub fn compute_etag(body: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(body)))
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Whether an `If-None-Match` / `If-Match` list contains `etag`.
pub fn matches_any(list: &str, etag: &str) -> bool {
    list.split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate == etag)
}

pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(CurrentUser(user_id)) = req.extensions().get::<CurrentUser>().cloned() else {
        return Ok(next.run(req).await);
    };
    let key = format!("{user_id}:{}", req.uri().path());
    let method = req.method().clone();

    if method == Method::GET {
        let if_none_match = header_str(req.headers(), header::IF_NONE_MATCH);
        let response = next.run(req).await;
        return tag_response(&st, key, if_none_match, response).await;
    }

    if matches!(method, Method::PUT | Method::PATCH | Method::DELETE)
        && let Some(if_match) = header_str(req.headers(), header::IF_MATCH)
        && let Some(current) = st.etags.get(&key)
        && !matches_any(&if_match, &current)
    {
        return Err(AppError::precondition_failed(
            "The resource has been modified since it was last read",
        ));
    }

    let response = next.run(req).await;
    if response.status().is_success() {
        st.etags.forget_with_ancestors(&key);
    }
    Ok(response)
}

async fn tag_response(
    st: &AppState,
    key: String,
    if_none_match: Option<String>,
    response: Response,
) -> Result<Response, AppError> {
    if response.status() != StatusCode::OK {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_TAGGED_BODY_BYTES).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to buffer response body");
        AppError::internal("Failed to read response body", json!({}))
    })?;

    let etag = compute_etag(&bytes);
    st.etags.set(key, etag.clone());
    let etag_value = HeaderValue::from_str(&etag)
        .map_err(|_| AppError::internal("Invalid ETag", json!({})))?;

    if if_none_match.is_some_and(|list| matches_any(&list, &etag)) {
        let mut not_modified = Response::new(Body::empty());
        *not_modified.status_mut() = StatusCode::NOT_MODIFIED;
        not_modified.headers_mut().insert(header::ETAG, etag_value);
        return Ok(not_modified);
    }

    parts.headers.insert(header::ETAG, etag_value);
    parts.headers.remove(header::CONTENT_LENGTH);
    Ok(Response::from_parts(parts, Body::from(bytes)))
}
