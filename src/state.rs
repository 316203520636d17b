//! Shared application state injected into handlers and middleware.

use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::middleware::etag::ETagStore;
use crate::api::middleware::idempotency::InFlightKeys;
use crate::api::middleware::rate_limit::RateLimits;
use crate::application::services::{
    EntryService, GitHubService, HabitService, ImportService, TagService, UserService,
};
use crate::auth::JwtValidator;
use crate::domain::repositories::{
    EntryRepository, GitHubTokenRepository, HabitRepository, ImportJobRepository, TagRepository,
    UserRepository,
};
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::crypto::EncryptionService;
use crate::infrastructure::github::GitHubApi;
use crate::infrastructure::persistence::{
    PgEntryRepository, PgGitHubTokenRepository, PgHabitRepository, PgImportJobRepository,
    PgTagRepository, PgUserRepository,
};
use crate::utils::hateoas::LinkBuilder;

/// One handle per repository trait.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub habits: Arc<dyn HabitRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub entries: Arc<dyn EntryRepository>,
    pub github_tokens: Arc<dyn GitHubTokenRepository>,
    pub import_jobs: Arc<dyn ImportJobRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            habits: Arc::new(PgHabitRepository::new(pool.clone())),
            tags: Arc::new(PgTagRepository::new(pool.clone())),
            entries: Arc::new(PgEntryRepository::new(pool.clone())),
            github_tokens: Arc::new(PgGitHubTokenRepository::new(pool.clone())),
            import_jobs: Arc::new(PgImportJobRepository::new(pool)),
        }
    }
}

/// Services and clients that are not repositories.
pub struct Infrastructure {
    /// Response cache for reads (may be a [`crate::infrastructure::cache::NullCache`]).
    pub cache: Arc<dyn CacheService>,
    /// Store for idempotent `POST` replays. Always a real cache.
    pub idempotency: Arc<dyn CacheService>,
    pub github: Arc<dyn GitHubApi>,
    pub encryption: EncryptionService,
    pub jwt: JwtValidator,
}

#[derive(Clone)]
pub struct AppState {
    pub habit_service: Arc<HabitService>,
    pub tag_service: Arc<TagService>,
    pub entry_service: Arc<EntryService>,
    pub import_service: Arc<ImportService>,
    pub user_service: Arc<UserService>,
    pub github_service: Arc<GitHubService>,

    /// Used by the health check.
    pub users: Arc<dyn UserRepository>,
    pub cache: Arc<dyn CacheService>,
    pub idempotency: Arc<dyn CacheService>,
    /// Idempotency keys whose first request is still running.
    pub in_flight: Arc<InFlightKeys>,
    pub etags: Arc<ETagStore>,
    pub jwt: Arc<JwtValidator>,
    pub rate_limits: Arc<RateLimits>,
    /// Trust `X-Forwarded-For` / `X-Real-IP` for the anonymous rate limit.
    pub behind_proxy: bool,
}

impl AppState {
    /// Wires the application services.
    ///
    /// `import_queue` feeds the background import worker; `public_base_url`
    /// roots every hypermedia link.
    pub fn new(
        repos: &Repositories,
        infra: Infrastructure,
        import_queue: mpsc::Sender<String>,
        public_base_url: &str,
        behind_proxy: bool,
    ) -> Self {
        let links = LinkBuilder::new(public_base_url);

        Self {
            habit_service: Arc::new(HabitService::new(
                repos.habits.clone(),
                repos.tags.clone(),
                infra.cache.clone(),
                links.clone(),
            )),
            tag_service: Arc::new(TagService::new(
                repos.tags.clone(),
                infra.cache.clone(),
                links.clone(),
            )),
            entry_service: Arc::new(EntryService::new(
                repos.entries.clone(),
                repos.habits.clone(),
                infra.cache.clone(),
                links.clone(),
            )),
            import_service: Arc::new(ImportService::new(
                repos.import_jobs.clone(),
                repos.habits.clone(),
                repos.entries.clone(),
                infra.cache.clone(),
                import_queue,
                links,
            )),
            user_service: Arc::new(UserService::new(repos.users.clone())),
            github_service: Arc::new(GitHubService::new(
                repos.github_tokens.clone(),
                infra.encryption,
                infra.github,
            )),
            users: repos.users.clone(),
            cache: infra.cache,
            idempotency: infra.idempotency,
            in_flight: Arc::new(InFlightKeys::default()),
            etags: Arc::new(ETagStore::new()),
            jwt: Arc::new(infra.jwt),
            rate_limits: Arc::new(RateLimits::new()),
            behind_proxy,
        }
    }
}
