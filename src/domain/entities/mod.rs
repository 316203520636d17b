//! Core domain entities representing the habit-tracking data model.
//!
//! Entities are plain data structures. Every aggregate has a string id made of
//! a short prefix and a UUIDv7, so ids sort by creation time and reveal their type.
//!
//! # Entity Types
//!
//! - [`User`] - An account mirrored from the identity provider (`u_`)
//! - [`Habit`] - A habit with frequency, target and optional milestone (`h_`)
//! - [`Tag`] - A user-defined label attached to habits (`t_`)
//! - [`Entry`] - One recorded completion of a habit (`e_`)
//! - [`GitHubAccessToken`] - An encrypted personal access token (`gh_`)
//! - [`EntryImportJob`] - A CSV import processed in the background (`ei_`)
//!
//! # Design Pattern
//!
//! Separate structs exist for creation (`NewHabit`, `NewEntry`, ...) and for
//! updates (`HabitChanges`, `TagChanges`, ...).
//!
//! Small integer-coded enums serialize as their numeric code and reject
//! unknown codes on input.

pub mod entry;
pub mod github_token;
pub mod habit;
pub mod import_job;
pub mod tag;
pub mod user;

pub use entry::{DailyEntryCount, Entry, EntryChanges, EntryFilter, EntrySource, NewEntry};
pub use github_token::{GitHubAccessToken, NewGitHubAccessToken};
pub use habit::{
    AutomationSource, Frequency, FrequencyType, Habit, HabitChanges, HabitFilter, HabitStatus,
    HabitType, Milestone, NewHabit, Target,
};
pub use import_job::{EntryImportJob, ImportJobProgress, ImportJobStatus, NewImportJob};
pub use tag::{NewTag, Tag, TagChanges};
pub use user::{NewUser, User};

use uuid::Uuid;

/// Generates a prefixed, time-ordered identifier such as `h_0190...`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7())
}

/// Declares an enum stored and transmitted as an `i32` code.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $code:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(into = "i32", try_from = "i32")]
        pub enum $name {
            $($variant = $code),+
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = String;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $($code => Ok($name::$variant),)+
                    other => Err(format!("unknown {} code: {}", stringify!($name), other)),
                }
            }
        }
    };
}

pub(crate) use coded_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_has_prefix_and_uuid() {
        let id = new_id("h");
        assert!(id.starts_with("h_"));
        assert!(Uuid::parse_str(&id[2..]).is_ok());
    }

    #[test]
    fn test_new_ids_are_time_ordered() {
        let first = new_id("e");
        let second = new_id("e");
        assert!(first < second);
    }
}
