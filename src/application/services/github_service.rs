//! GitHub personal access tokens and proxied GitHub reads.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use validator::Validate;

use crate::api::dto::github::{GitHubEvent, GitHubUserProfile, StoreGitHubAccessTokenDto};
use crate::domain::entities::{NewGitHubAccessToken, new_id};
use crate::domain::repositories::GitHubTokenRepository;
use crate::error::AppError;
use crate::infrastructure::crypto::EncryptionService;
use crate::infrastructure::github::{GitHubApi, GitHubError};

pub const MAX_EVENTS_PER_PAGE: u32 = 50;

pub struct GitHubService {
    tokens: Arc<dyn GitHubTokenRepository>,
    encryption: EncryptionService,
    github: Arc<dyn GitHubApi>,
}

impl GitHubService {
    pub fn new(
        tokens: Arc<dyn GitHubTokenRepository>,
        encryption: EncryptionService,
        github: Arc<dyn GitHubApi>,
    ) -> Self {
        Self {
            tokens,
            encryption,
            github,
        }
    }

    /// Encrypts and stores the user's token, replacing any previous one.
    pub async fn store_token(
        &self,
        user_id: &str,
        dto: StoreGitHubAccessTokenDto,
    ) -> Result<(), AppError> {
        dto.validate()?;

        let token = self.encryption.encrypt(dto.access_token.trim()).map_err(|e| {
            tracing::error!(error = %e, "Failed to encrypt GitHub token");
            AppError::internal("Failed to store access token", json!({}))
        })?;

        self.tokens
            .upsert(NewGitHubAccessToken {
                id: new_id("gh"),
                user_id: user_id.to_string(),
                token,
                expires_at_utc: Utc::now() + Duration::days(dto.expires_in_days),
            })
            .await?;

        tracing::info!(user_id, "GitHub access token stored");
        Ok(())
    }

    pub async fn revoke_token(&self, user_id: &str) -> Result<(), AppError> {
        if !self.tokens.delete_by_user(user_id).await? {
            return Err(token_not_found());
        }
        tracing::info!(user_id, "GitHub access token revoked");
        Ok(())
    }

    /// The user's plain token, or `None` if absent, expired or undecryptable.
    pub async fn access_token(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let Some(stored) = self.tokens.find_by_user(user_id).await? else {
            return Ok(None);
        };
        if stored.is_expired(Utc::now()) {
            return Ok(None);
        }

        match self.encryption.decrypt(&stored.token) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Stored GitHub token cannot be decrypted");
                Ok(None)
            }
        }
    }

    pub async fn profile(&self, user_id: &str) -> Result<GitHubUserProfile, AppError> {
        let token = self.require_token(user_id).await?;
        self.github.get_profile(&token).await.map_err(upstream_error)
    }

    /// The authenticated GitHub user's recent events.
    pub async fn events(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitHubEvent>, AppError> {
        if page == 0 {
            return Err(AppError::bad_request(
                "Page must be greater than 0",
                json!({ "page": page }),
            ));
        }
        if !(1..=MAX_EVENTS_PER_PAGE).contains(&per_page) {
            return Err(AppError::bad_request(
                format!("per_page must be between 1 and {MAX_EVENTS_PER_PAGE}"),
                json!({ "per_page": per_page }),
            ));
        }

        let token = self.require_token(user_id).await?;
        let profile = self.github.get_profile(&token).await.map_err(upstream_error)?;
        self.github
            .get_user_events(&token, &profile.login, page, per_page)
            .await
            .map_err(upstream_error)
    }

    async fn require_token(&self, user_id: &str) -> Result<String, AppError> {
        self.access_token(user_id)
            .await?
            .ok_or_else(token_not_found)
    }
}

fn token_not_found() -> AppError {
    AppError::not_found("GitHub access token not found", json!({}))
}

pub fn upstream_error(e: GitHubError) -> AppError {
    tracing::warn!(error = %e, "GitHub request failed");
    match e {
        GitHubError::Unauthorized => AppError::bad_gateway(
            "GitHub rejected the stored access token",
            json!({}),
        ),
        GitHubError::Status(status) => AppError::bad_gateway(
            "GitHub request failed",
            json!({ "status": status }),
        ),
        GitHubError::Http(_) => AppError::bad_gateway("GitHub is unreachable", json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::GitHubAccessToken;
    use crate::domain::repositories::MockGitHubTokenRepository;
    use crate::infrastructure::github::MockGitHubApi;
    use chrono::DateTime;

    fn encryption() -> EncryptionService {
        EncryptionService::from_key_bytes(&[7u8; 32]).unwrap()
    }

    fn stored(token: &str, expires_at_utc: DateTime<Utc>) -> GitHubAccessToken {
        GitHubAccessToken {
            id: "gh_1".to_string(),
            user_id: "u_1".to_string(),
            token: encryption().encrypt(token).unwrap(),
            expires_at_utc,
            created_at_utc: Utc::now(),
        }
    }

    fn profile() -> GitHubUserProfile {
        GitHubUserProfile {
            login: "octocat".to_string(),
            name: None,
            avatar_url: None,
            bio: None,
            public_repos: 1,
            followers: 0,
            following: 0,
        }
    }

    fn service(tokens: MockGitHubTokenRepository, github: MockGitHubApi) -> GitHubService {
        GitHubService::new(Arc::new(tokens), encryption(), Arc::new(github))
    }

    #[tokio::test]
    async fn test_store_token_encrypts() {
        let mut tokens = MockGitHubTokenRepository::new();
        tokens
            .expect_upsert()
            .withf(|t| {
                t.token != "ghp_secret"
                    && encryption().decrypt(&t.token).unwrap() == "ghp_secret"
                    && t.expires_at_utc > Utc::now() + Duration::days(29)
            })
            .times(1)
            .returning(|_| Ok(()));

        let dto = StoreGitHubAccessTokenDto {
            access_token: "ghp_secret".to_string(),
            expires_in_days: 30,
        };
        service(tokens, MockGitHubApi::new())
            .store_token("u_1", dto)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_token_rejects_zero_days() {
        let dto = StoreGitHubAccessTokenDto {
            access_token: "ghp_secret".to_string(),
            expires_in_days: 0,
        };
        let err = service(MockGitHubTokenRepository::new(), MockGitHubApi::new())
            .store_token("u_1", dto)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_expired_token_is_absent() {
        let mut tokens = MockGitHubTokenRepository::new();
        tokens
            .expect_find_by_user()
            .returning(|_| Ok(Some(stored("ghp_old", Utc::now() - Duration::days(1)))));

        let token = service(tokens, MockGitHubApi::new())
            .access_token("u_1")
            .await
            .unwrap();
        assert_eq!(token, None);
    }

    #[tokio::test]
    async fn test_revoke_missing_token() {
        let mut tokens = MockGitHubTokenRepository::new();
        tokens.expect_delete_by_user().returning(|_| Ok(false));

        let err = service(tokens, MockGitHubApi::new())
            .revoke_token("u_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_profile_without_token_is_not_found() {
        let mut tokens = MockGitHubTokenRepository::new();
        tokens.expect_find_by_user().returning(|_| Ok(None));

        let err = service(tokens, MockGitHubApi::new())
            .profile("u_1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let mut tokens = MockGitHubTokenRepository::new();
        tokens
            .expect_find_by_user()
            .returning(|_| Ok(Some(stored("ghp_live", Utc::now() + Duration::days(1)))));
        let mut github = MockGitHubApi::new();
        github
            .expect_get_profile()
            .withf(|token| token == "ghp_live")
            .returning(|_| Err(GitHubError::Status(503)));

        let err = service(tokens, github).profile("u_1").await.unwrap_err();
        assert!(matches!(err, AppError::BadGateway { .. }));
    }

    #[tokio::test]
    async fn test_events_uses_profile_login() {
        let mut tokens = MockGitHubTokenRepository::new();
        tokens
            .expect_find_by_user()
            .returning(|_| Ok(Some(stored("ghp_live", Utc::now() + Duration::days(1)))));
        let mut github = MockGitHubApi::new();
        github.expect_get_profile().returning(|_| Ok(profile()));
        github
            .expect_get_user_events()
            .withf(|_, login, page, per_page| login == "octocat" && *page == 2 && *per_page == 10)
            .returning(|_, _, _, _| Ok(vec![]));

        let events = service(tokens, github).events("u_1", 2, 10).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_events_paging_bounds() {
        let svc = service(MockGitHubTokenRepository::new(), MockGitHubApi::new());
        assert!(svc.events("u_1", 0, 10).await.is_err());
        assert!(svc.events("u_1", 1, 0).await.is_err());
        assert!(svc.events("u_1", 1, 51).await.is_err());
    }
}
