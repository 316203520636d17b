//! Application layer services implementing business logic.
//!
//! Services coordinate repository calls, validation, caching and link
//! generation. They consume repository traits, so handlers and background
//! jobs never touch SQL directly.
//!
//! # Available Services
//!
//! - [`services::HabitService`] - Habits, their tags and cached listings
//! - [`services::TagService`] - Per-user tags
//! - [`services::EntryService`] - Entries, batches and streak statistics
//! - [`services::UserService`] - Identity-to-user mapping and profiles
//! - [`services::GitHubService`] - Stored GitHub tokens and proxied reads
//! - [`services::ImportService`] - CSV import jobs

pub mod services;
