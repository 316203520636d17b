//! Turns GitHub push events into entries for habits automated with GitHub.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::services::GitHubService;
use crate::application::services::github_service::upstream_error;
use crate::application::services::entry_service::{record_created, without_known_external_ids};
use crate::application::services::habit_service::evict_user_habits;
use crate::domain::entities::{AutomationSource, EntrySource, Habit, NewEntry, new_id};
use crate::domain::repositories::{EntryRepository, HabitRepository};
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::github::{GitHubApi, GitHubEvent};

const EVENTS_PER_SCAN: u32 = 100;

pub struct GitHubAutomation {
    habits: Arc<dyn HabitRepository>,
    entries: Arc<dyn EntryRepository>,
    github_service: Arc<GitHubService>,
    github: Arc<dyn GitHubApi>,
    cache: Arc<dyn CacheService>,
}

impl GitHubAutomation {
    pub fn new(
        habits: Arc<dyn HabitRepository>,
        entries: Arc<dyn EntryRepository>,
        github_service: Arc<GitHubService>,
        github: Arc<dyn GitHubApi>,
        cache: Arc<dyn CacheService>,
    ) -> Self {
        Self {
            habits,
            entries,
            github_service,
            github,
            cache,
        }
    }

    /// Scans every `interval` until `shutdown` changes.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "GitHub automation started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(created) => debug!(created, "GitHub automation scan finished"),
                        Err(e) => warn!(error = %e, "GitHub automation scan failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("GitHub automation stopped");
    }

    /// Processes all automated habits once. Returns the number of entries created.
    ///
    /// # Errors
    ///
    /// Fails only when the habit list itself cannot be loaded; per-habit
    /// failures are logged and skipped.
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let habits = self.habits.list_automated().await?;
        let mut created = 0;

        for habit in habits
            .iter()
            .filter(|h| h.automation_source == AutomationSource::GitHub)
        {
            match self.process_habit(habit).await {
                Ok(count) => created += count,
                Err(e) => warn!(
                    habit_id = %habit.id,
                    user_id = %habit.user_id,
                    error = %e,
                    "GitHub automation failed for habit"
                ),
            }
        }

        Ok(created)
    }

    async fn process_habit(&self, habit: &Habit) -> Result<usize, AppError> {
        let Some(token) = self.github_service.access_token(&habit.user_id).await? else {
            debug!(habit_id = %habit.id, "No usable GitHub token; skipping habit");
            return Ok(0);
        };

        let profile = self
            .github
            .get_profile(&token)
            .await
            .map_err(upstream_error)?;
        let events = self
            .github
            .get_user_events(&token, &profile.login, 1, EVENTS_PER_SCAN)
            .await
            .map_err(upstream_error)?;

        let candidates = push_entries(habit, &events);
        if candidates.is_empty() {
            return Ok(0);
        }

        let external_ids = candidates
            .iter()
            .filter_map(|e| e.external_id.clone())
            .collect();
        let known = self.entries.existing_external_ids(external_ids).await?;
        let fresh = without_known_external_ids(candidates, &known);
        if fresh.is_empty() {
            return Ok(0);
        }

        let created = self.entries.create_batch(fresh).await?;
        record_created(EntrySource::Automation, created.len() as u64);
        evict_user_habits(self.cache.as_ref(), &habit.user_id).await;

        info!(
            habit_id = %habit.id,
            count = created.len(),
            "Created entries from GitHub push events"
        );
        Ok(created.len())
    }
}

/// One automation entry per push event.
pub fn push_entries(habit: &Habit, events: &[GitHubEvent]) -> Vec<NewEntry> {
    events
        .iter()
        .filter(|e| e.is_push())
        .map(|event| NewEntry {
            id: new_id("e"),
            habit_id: habit.id.clone(),
            user_id: habit.user_id.clone(),
            value: 1,
            notes: Some(format!(
                "{} commits pushed to {}",
                event.commit_count(),
                event.repo.name
            )),
            source: EntrySource::Automation,
            external_id: Some(event.id.clone()),
            date: event.created_at.date_naive(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        Entry, Frequency, FrequencyType, GitHubAccessToken, HabitStatus, HabitType, Target,
    };
    use crate::domain::repositories::{
        MockEntryRepository, MockGitHubTokenRepository, MockHabitRepository,
    };
    use crate::infrastructure::cache::NullCache;
    use crate::infrastructure::crypto::EncryptionService;
    use crate::infrastructure::github::{
        GitHubActor, GitHubError, GitHubPayload, GitHubRepository, GitHubUserProfile,
        MockGitHubApi,
    };
    use chrono::{DateTime, Utc};

    fn habit(id: &str, user_id: &str) -> Habit {
        Habit {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: "Commit code".to_string(),
            description: None,
            habit_type: HabitType::Binary,
            frequency: Frequency {
                frequency_type: FrequencyType::Daily,
                times_per_period: 1,
            },
            target: Target {
                value: 1,
                unit: "tasks".to_string(),
            },
            status: HabitStatus::Ongoing,
            is_archived: false,
            end_date: None,
            milestone: None,
            automation_source: AutomationSource::GitHub,
            created_at_utc: Utc::now(),
            updated_at_utc: None,
            last_completed_at_utc: None,
        }
    }

    fn event(id: &str, event_type: &str, size: i64, at: &str) -> GitHubEvent {
        GitHubEvent {
            id: id.to_string(),
            event_type: event_type.to_string(),
            actor: GitHubActor {
                login: "octocat".to_string(),
                avatar_url: None,
            },
            repo: GitHubRepository {
                name: "octocat/hello".to_string(),
                url: None,
            },
            payload: GitHubPayload {
                size: Some(size),
                ..Default::default()
            },
            created_at: at.parse::<DateTime<Utc>>().unwrap(),
        }
    }

    fn profile() -> GitHubUserProfile {
        GitHubUserProfile {
            login: "octocat".to_string(),
            name: None,
            avatar_url: None,
            bio: None,
            public_repos: 0,
            followers: 0,
            following: 0,
        }
    }

    fn stored_token(encryption: &EncryptionService, user_id: &str) -> GitHubAccessToken {
        GitHubAccessToken {
            id: "gh_1".to_string(),
            user_id: user_id.to_string(),
            token: encryption.encrypt("ghp_secret").unwrap(),
            expires_at_utc: Utc::now() + chrono::Duration::days(1),
            created_at_utc: Utc::now(),
        }
    }

    fn automation(
        habits: MockHabitRepository,
        entries: MockEntryRepository,
        tokens: MockGitHubTokenRepository,
        github: MockGitHubApi,
    ) -> GitHubAutomation {
        let github: Arc<dyn GitHubApi> = Arc::new(github);
        let service = GitHubService::new(
            Arc::new(tokens),
            EncryptionService::from_key_bytes(&[7u8; 32]).unwrap(),
            github.clone(),
        );
        GitHubAutomation::new(
            Arc::new(habits),
            Arc::new(entries),
            Arc::new(service),
            github,
            Arc::new(NullCache::new()),
        )
    }

    #[test]
    fn test_push_entries_only_for_push_events() {
        let h = habit("h_1", "u_1");
        let events = vec![
            event("101", "PushEvent", 3, "2025-03-01T10:00:00Z"),
            event("102", "WatchEvent", 0, "2025-03-01T11:00:00Z"),
            event("103", "PushEvent", 1, "2025-03-02T23:30:00Z"),
        ];

        let entries = push_entries(&h, &events);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].external_id.as_deref(), Some("101"));
        assert_eq!(entries[0].value, 1);
        assert_eq!(entries[0].source, EntrySource::Automation);
        assert_eq!(
            entries[0].notes.as_deref(),
            Some("3 commits pushed to octocat/hello")
        );
        assert_eq!(entries[1].date.to_string(), "2025-03-02");
    }

    #[tokio::test]
    async fn test_run_once_skips_known_events() {
        let encryption = EncryptionService::from_key_bytes(&[7u8; 32]).unwrap();

        let mut habits = MockHabitRepository::new();
        habits
            .expect_list_automated()
            .returning(|| Ok(vec![habit("h_1", "u_1")]));

        let mut tokens = MockGitHubTokenRepository::new();
        let token = stored_token(&encryption, "u_1");
        tokens
            .expect_find_by_user()
            .returning(move |_| Ok(Some(token.clone())));

        let mut github = MockGitHubApi::new();
        github
            .expect_get_profile()
            .withf(|token| token == "ghp_secret")
            .returning(|_| Ok(profile()));
        github
            .expect_get_user_events()
            .withf(|_, login, page, per_page| login == "octocat" && *page == 1 && *per_page == 100)
            .returning(|_, _, _, _| {
                Ok(vec![
                    event("101", "PushEvent", 2, "2025-03-01T10:00:00Z"),
                    event("102", "PushEvent", 1, "2025-03-01T12:00:00Z"),
                ])
            });

        let mut entries = MockEntryRepository::new();
        entries
            .expect_existing_external_ids()
            .returning(|_| Ok(vec!["101".to_string()]));
        entries
            .expect_create_batch()
            .withf(|batch| batch.len() == 1 && batch[0].external_id.as_deref() == Some("102"))
            .times(1)
            .returning(|batch| {
                Ok(batch
                    .into_iter()
                    .map(|n| Entry {
                        id: n.id,
                        habit_id: n.habit_id,
                        user_id: n.user_id,
                        value: n.value,
                        notes: n.notes,
                        source: n.source,
                        external_id: n.external_id,
                        is_archived: false,
                        date: n.date,
                        created_at_utc: Utc::now(),
                        updated_at_utc: None,
                    })
                    .collect())
            });

        let job = automation(habits, entries, tokens, github);
        assert_eq!(job.run_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_once_continues_after_habit_failure() {
        let encryption = EncryptionService::from_key_bytes(&[7u8; 32]).unwrap();

        let mut habits = MockHabitRepository::new();
        habits
            .expect_list_automated()
            .returning(|| Ok(vec![habit("h_1", "u_1"), habit("h_2", "u_2")]));

        let mut tokens = MockGitHubTokenRepository::new();
        let first = stored_token(&encryption, "u_1");
        tokens
            .expect_find_by_user()
            .withf(|user_id| user_id == "u_1")
            .returning(move |_| Ok(Some(first.clone())));
        tokens
            .expect_find_by_user()
            .withf(|user_id| user_id == "u_2")
            .returning(|_| Ok(None));

        let mut github = MockGitHubApi::new();
        github
            .expect_get_profile()
            .returning(|_| Err(GitHubError::Status(503)));

        let job = automation(habits, MockEntryRepository::new(), tokens, github);
        assert_eq!(job.run_once().await.unwrap(), 0);
    }
}
