//! Maps authenticated identities to application users.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use validator::Validate;

use crate::api::dto::users::{UpdateProfileDto, UserDto};
use crate::auth::claims::Identity;
use crate::domain::entities::NewUser;
use crate::domain::repositories::UserRepository;
use crate::error::AppError;

/// How long a resolved identity stays cached after its last use.
pub const USER_ID_TTL: Duration = Duration::from_secs(30 * 60);

struct CachedUserId {
    user_id: String,
    last_used: Instant,
}

/// Resolves token subjects to user ids and serves the user endpoints.
///
/// Resolutions are kept in memory with a sliding expiry, so a busy client
/// hits the database once per half hour at most.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    resolved: Mutex<HashMap<String, CachedUserId>>,
    ttl: Duration,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self::with_ttl(users, USER_ID_TTL)
    }

    pub fn with_ttl(users: Arc<dyn UserRepository>, ttl: Duration) -> Self {
        Self {
            users,
            resolved: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the user id for a verified identity, registering the user on first sight.
    pub async fn resolve(&self, identity: &Identity) -> Result<String, AppError> {
        if let Some(user_id) = self.cached(&identity.subject) {
            return Ok(user_id);
        }

        let user = match self.users.find_by_identity_id(&identity.subject).await? {
            Some(user) => user,
            None => {
                let new_user = NewUser::from_identity(
                    &identity.subject,
                    &identity.email,
                    identity.name.as_deref(),
                );
                let user = self.users.get_or_create(new_user).await?;
                tracing::info!(user_id = %user.id, "User registered");
                user
            }
        };

        self.remember(&identity.subject, &user.id);
        Ok(user.id)
    }

    pub async fn me(&self, user_id: &str) -> Result<UserDto, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(UserDto::from)
            .ok_or_else(|| user_not_found(user_id))
    }

    /// Reads a user record. Only the caller's own record is visible.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<UserDto, AppError> {
        if user_id != id {
            return Err(AppError::forbidden("You can only access your own user record"));
        }
        self.me(user_id).await
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        mut dto: UpdateProfileDto,
    ) -> Result<(), AppError> {
        dto.name = dto.name.trim().to_string();
        dto.validate()?;

        if !self.users.update_name(user_id, &dto.name).await? {
            return Err(user_not_found(user_id));
        }
        Ok(())
    }

    fn cached(&self, subject: &str) -> Option<String> {
        let mut resolved = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        match resolved.get_mut(subject) {
            Some(entry) if now.duration_since(entry.last_used) < self.ttl => {
                entry.last_used = now;
                Some(entry.user_id.clone())
            }
            Some(_) => {
                resolved.remove(subject);
                None
            }
            None => None,
        }
    }

    fn remember(&self, subject: &str, user_id: &str) {
        let mut resolved = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        resolved.retain(|_, entry| now.duration_since(entry.last_used) < self.ttl);
        resolved.insert(
            subject.to_string(),
            CachedUserId {
                user_id: user_id.to_string(),
                last_used: now,
            },
        );
    }
}

fn user_not_found(id: &str) -> AppError {
    AppError::not_found("User not found", json!({ "id": id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::User;
    use crate::domain::repositories::MockUserRepository;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn identity() -> Identity {
        Identity {
            subject: "kc-1".to_string(),
            email: "ada@example.com".to_string(),
            name: Some("Ada Lovelace".to_string()),
            roles: BTreeSet::from(["member".to_string()]),
        }
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            email: "ada@example.com".to_string(),
            name: name.to_string(),
            identity_id: "kc-1".to_string(),
            created_at_utc: Utc::now(),
            updated_at_utc: None,
        }
    }

    #[tokio::test]
    async fn test_resolve_registers_new_user_once() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_identity_id()
            .times(1)
            .returning(|_| Ok(None));
        users
            .expect_get_or_create()
            .withf(|u| u.name == "Ada" && u.identity_id == "kc-1")
            .times(1)
            .returning(|u| Ok(user(&u.id, &u.name)));

        let svc = UserService::new(Arc::new(users));
        let first = svc.resolve(&identity()).await.unwrap();
        let second = svc.resolve(&identity()).await.unwrap();

        assert!(first.starts_with("u_"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_resolution_hits_repository_again() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_identity_id()
            .times(2)
            .returning(|_| Ok(Some(user("u_1", "Ada"))));

        let svc = UserService::with_ttl(Arc::new(users), Duration::ZERO);
        svc.resolve(&identity()).await.unwrap();
        svc.resolve(&identity()).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_other_user_is_forbidden() {
        let svc = UserService::new(Arc::new(MockUserRepository::new()));
        let err = svc.get("u_1", "u_2").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_update_profile_validates_name() {
        let mut users = MockUserRepository::new();
        users.expect_update_name().times(0);
        let svc = UserService::new(Arc::new(users));

        let err = svc
            .update_profile("u_1", UpdateProfileDto { name: String::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = svc
            .update_profile("u_1", UpdateProfileDto { name: "   ".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_me_returns_user() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(|id| Ok(Some(user(id, "Ada"))));
        let svc = UserService::new(Arc::new(users));

        let me = svc.me("u_1").await.unwrap();
        assert_eq!(me.id, "u_1");
        assert_eq!(me.name, "Ada");
    }
}
