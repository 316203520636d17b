//! GitHub REST API client.
//!
//! Only the two calls the application needs: the authenticated user's
//! profile and a user's public event feed. Transient failures (network
//! errors and 5xx responses) are retried with jittered exponential backoff;
//! 4xx responses are returned immediately.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

const USER_AGENT: &str = "DevHabit/1.0";
const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub rejected the access token")]
    Unauthorized,
    #[error("GitHub responded with status {0}")]
    Status(u16),
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl GitHubError {
    fn is_transient(&self) -> bool {
        match self {
            GitHubError::Unauthorized => false,
            GitHubError::Status(code) => *code >= 500,
            GitHubError::Http(e) => !e.is_decode(),
        }
    }
}

// GitHub payloads arrive in snake_case and are re-emitted to API clients in camelCase.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct GitHubUserProfile {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub public_repos: i64,
    #[serde(default)]
    pub followers: i64,
    #[serde(default)]
    pub following: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct GitHubEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub actor: GitHubActor,
    pub repo: GitHubRepository,
    #[serde(default)]
    pub payload: GitHubPayload,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct GitHubActor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitHubPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub commits: Option<Vec<GitHubCommit>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl GitHubEvent {
    pub fn is_push(&self) -> bool {
        self.event_type == "PushEvent"
    }

    /// Commits in a push: the reported `size`, else the listed commits.
    pub fn commit_count(&self) -> i64 {
        self.payload
            .size
            .or_else(|| self.payload.commits.as_ref().map(|c| c.len() as i64))
            .unwrap_or(0)
    }
}

/// Outbound GitHub operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn get_profile(&self, token: &str) -> Result<GitHubUserProfile, GitHubError>;

    async fn get_user_events(
        &self,
        token: &str,
        login: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitHubEvent>, GitHubError>;
}

/// [`GitHubApi`] over HTTPS with `reqwest`.
pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(base_url: &str) -> Result<Self, GitHubError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GitHubError> {
        let url = format!("{}{}", self.base_url, path);
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);

        RetryIf::spawn(
            strategy,
            || async {
                let response = self
                    .client
                    .get(&url)
                    .query(query)
                    .header(header::ACCEPT, ACCEPT)
                    .bearer_auth(token)
                    .send()
                    .await?;

                match response.status() {
                    StatusCode::UNAUTHORIZED => Err(GitHubError::Unauthorized),
                    status if !status.is_success() => Err(GitHubError::Status(status.as_u16())),
                    _ => Ok(response.json::<T>().await?),
                }
            },
            |e: &GitHubError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(url = %url, error = %e, "Retrying GitHub request");
                }
                retry
            },
        )
        .await
    }
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn get_profile(&self, token: &str) -> Result<GitHubUserProfile, GitHubError> {
        self.get_json(token, "/user", &[]).await
    }

    async fn get_user_events(
        &self,
        token: &str,
        login: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<GitHubEvent>, GitHubError> {
        let path = format!("/users/{login}/events");
        self.get_json(
            token,
            &path,
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }
}
