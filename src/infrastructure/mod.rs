//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for data persistence, caching and outbound calls.
//!
//! # Modules
//!
//! - [`cache`] - Response cache (PostgreSQL table and no-op implementations)
//! - [`crypto`] - AES-GCM encryption for secrets at rest
//! - [`github`] - GitHub REST API client
//! - [`persistence`] - PostgreSQL repository implementations

pub mod cache;
pub mod crypto;
pub mod github;
pub mod persistence;
