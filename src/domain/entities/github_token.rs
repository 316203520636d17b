//! Stored GitHub personal access token.

use chrono::{DateTime, Utc};

/// One token per user. `token` holds ciphertext, never the plain value.
#[derive(Debug, Clone, PartialEq)]
pub struct GitHubAccessToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at_utc: DateTime<Utc>,
    pub created_at_utc: DateTime<Utc>,
}

impl GitHubAccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at_utc <= now
    }
}

#[derive(Debug, Clone)]
pub struct NewGitHubAccessToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at_utc: DateTime<Utc>,
}
