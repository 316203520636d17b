//! HTTP middleware for request processing and protection.
//!
//! Layers on `/api`, outermost first:
//!
//! 1. [`auth::authenticate`] - Verifies the bearer token, if any
//! 2. [`rate_limit::layer`] - Per-user or per-IP budgets
//! 3. [`auth::require_member`] - 401/403 and user resolution
//! 4. [`idempotency::layer`] - `Idempotency-Key` replay for `POST`
//! 5. [`etag::layer`] - Conditional `GET` and `If-Match` checks
//!
//! [`tracing::layer`] wraps the whole application.

pub mod auth;
pub mod etag;
pub mod idempotency;
pub mod rate_limit;
pub mod tracing;
