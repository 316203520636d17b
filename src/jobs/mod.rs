//! Background jobs spawned by the server.
//!
//! - [`github_automation`] - Periodic GitHub push-event import for automated habits
//! - [`import_worker`] - Drains the CSV import queue
//! - [`import_cleanup`] - Daily retention sweep of finished import jobs
//!
//! Every loop takes a `watch::Receiver<bool>` and returns once it changes,
//! which is how [`crate::server::run`] stops them on shutdown.

pub mod github_automation;
pub mod import_cleanup;
pub mod import_worker;

pub use github_automation::GitHubAutomation;
