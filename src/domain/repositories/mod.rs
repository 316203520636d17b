//! Repository trait definitions for the domain layer.
//!
//! Implementations live in `crate::infrastructure::persistence`; mocks are
//! generated with `mockall` for service unit tests.
//!
//! Every user-facing query takes the caller's `user_id` and never returns rows
//! owned by someone else. The only unscoped operations are the ones background
//! jobs need: automated habits across users, pending import jobs and the
//! retention sweep.
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod entry_repository;
pub mod github_token_repository;
pub mod habit_repository;
pub mod import_job_repository;
pub mod tag_repository;
pub mod user_repository;

pub use entry_repository::EntryRepository;
pub use github_token_repository::GitHubTokenRepository;
pub use habit_repository::HabitRepository;
pub use import_job_repository::ImportJobRepository;
pub use tag_repository::TagRepository;
pub use user_repository::UserRepository;

#[cfg(test)]
pub use entry_repository::MockEntryRepository;
#[cfg(test)]
pub use github_token_repository::MockGitHubTokenRepository;
#[cfg(test)]
pub use habit_repository::MockHabitRepository;
#[cfg(test)]
pub use import_job_repository::MockImportJobRepository;
#[cfg(test)]
pub use tag_repository::MockTagRepository;
#[cfg(test)]
pub use user_repository::MockUserRepository;
