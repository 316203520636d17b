//! Tag entity.

use chrono::{DateTime, Utc};

/// A label a user attaches to habits. Names are unique per user.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewTag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TagChanges {
    pub name: String,
    pub description: Option<String>,
}
