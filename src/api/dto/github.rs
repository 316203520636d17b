//! DTOs for GitHub integration endpoints.

use regex::Regex;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::sync::LazyLock;
use validator::Validate;

pub use crate::infrastructure::github::{GitHubEvent, GitHubUserProfile};

/// A single whitespace-free token, optionally padded.
static ACCESS_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\S+\s*$").unwrap());

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoreGitHubAccessTokenDto {
    #[validate(length(min = 1, max = 1000, message = "Access token is required"))]
    #[validate(regex(path = "*ACCESS_TOKEN_REGEX", message = "Access token must not contain spaces"))]
    pub access_token: String,
    #[validate(range(min = 1, max = 365, message = "Expiry must be between 1 and 365 days"))]
    pub expires_in_days: i64,
}

/// Query parameters for `GET /api/github/events`.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubEventsQuery {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub page: Option<u32>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(token: &str) -> StoreGitHubAccessTokenDto {
        StoreGitHubAccessTokenDto {
            access_token: token.to_string(),
            expires_in_days: 30,
        }
    }

    #[test]
    fn test_access_token_validation() {
        assert!(dto("ghp_abc123").validate().is_ok());
        assert!(dto(" ghp_abc123 ").validate().is_ok());
        assert!(dto("ghp abc").validate().is_err());
        assert!(dto("").validate().is_err());
    }
}
