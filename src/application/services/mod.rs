//! Business logic services for the application layer.

pub mod entry_service;
pub mod github_service;
pub mod habit_service;
pub mod import_service;
pub mod query;
pub mod tag_service;
pub mod user_service;

pub use entry_service::EntryService;
pub use github_service::GitHubService;
pub use habit_service::HabitService;
pub use import_service::ImportService;
pub use tag_service::TagService;
pub use user_service::UserService;
