//! DTOs for tag endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::entities::Tag;
use crate::utils::data_shaping::Shapeable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

impl Shapeable for TagDto {
    const FIELDS: &'static [&'static str] =
        &["id", "name", "description", "createdAtUtc", "updatedAtUtc"];
}

impl From<Tag> for TagDto {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            description: tag.description,
            created_at_utc: tag.created_at_utc,
            updated_at_utc: tag.updated_at_utc,
        }
    }
}

/// Body of `POST /api/tags` and `PUT /api/tags/{id}`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertTagDto {
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,
}
