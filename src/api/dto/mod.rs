//! Data Transfer Objects for API requests and responses.
//!
//! All DTOs use Serde for JSON serialization/deserialization and validator
//! for input validation. Property names are camelCase on the wire.

pub mod entries;
pub mod github;
pub mod habits;
pub mod health;
pub mod imports;
pub mod pagination;
pub mod tags;
pub mod users;
