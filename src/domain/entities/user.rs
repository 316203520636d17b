//! User entity mirrored from the identity provider.

use chrono::{DateTime, Utc};

/// An application user.
///
/// Created lazily the first time a token with an unknown `sub` is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// The identity provider's subject claim.
    pub identity_id: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

/// Input data for registering a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub identity_id: String,
}

impl NewUser {
    /// Builds a user from token claims.
    ///
    /// The display name is the first word of the `name` claim, falling back to
    /// the local part of the email address. Name and email are cut to the
    /// column lengths, counted in characters.
    pub fn from_identity(identity_id: &str, email: &str, full_name: Option<&str>) -> Self {
        let name = full_name
            .and_then(|n| n.split_whitespace().next())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default());

        Self {
            id: super::new_id("u"),
            email: truncate_chars(email, MAX_EMAIL_CHARS),
            name: truncate_chars(name, MAX_NAME_CHARS),
            identity_id: identity_id.to_string(),
        }
    }
}

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 300;

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
