//! Response cache.
//!
//! Provides a [`CacheService`] trait with two implementations:
//! - [`PgCache`] - PostgreSQL table with a read-time TTL
//! - [`NullCache`] - No-op implementation for disabled caching
//!
//! [`get_typed`], [`set_typed`] and [`evict`] wrap the raw JSON calls and
//! swallow errors so callers never fail because of the cache.

mod null_cache;
mod pg_cache;
mod service;

pub use null_cache::NullCache;
pub use pg_cache::{PgCache, escape_like};
pub use service::{CacheError, CacheResult, CacheService, evict, get_typed, set_typed};
