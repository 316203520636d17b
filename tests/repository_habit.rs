use dev_habit::domain::entities::{
    AutomationSource, Frequency, FrequencyType, HabitFilter, HabitStatus, HabitType, NewHabit,
    NewTag, NewUser, Target, new_id,
};
use dev_habit::domain::repositories::{HabitRepository, TagRepository, UserRepository};
use dev_habit::infrastructure::persistence::{
    PgHabitRepository, PgTagRepository, PgUserRepository,
};
use sqlx::PgPool;
use std::sync::Arc;

async fn user(pool: &Arc<PgPool>, subject: &str) -> String {
    PgUserRepository::new(pool.clone())
        .get_or_create(NewUser::from_identity(subject, "a@example.com", Some("Ada")))
        .await
        .unwrap()
        .id
}

fn new_habit(user_id: &str, name: &str, automation: AutomationSource) -> NewHabit {
    NewHabit {
        id: new_id("h"),
        user_id: user_id.to_string(),
        name: name.to_string(),
        description: None,
        habit_type: HabitType::Measurable,
        frequency: Frequency {
            frequency_type: FrequencyType::Daily,
            times_per_period: 1,
        },
        target: Target {
            value: 30,
            unit: "minutes".to_string(),
        },
        end_date: None,
        milestone_target: Some(10),
        automation_source: automation,
    }
}

#[sqlx::test]
async fn test_create_and_find_habit(pool: PgPool) {
    let pool = Arc::new(pool);
    let user_id = user(&pool, "kc-1").await;
    let repo = PgHabitRepository::new(pool.clone());

    let created = repo
        .create(new_habit(&user_id, "Read books", AutomationSource::None))
        .await
        .unwrap();

    assert_eq!(created.status, HabitStatus::Ongoing);
    assert_eq!(created.milestone.map(|m| (m.target, m.current)), Some((10, 0)));

    let found = repo.find_by_id(&user_id, &created.id).await.unwrap();
    assert_eq!(found, Some(created.clone()));
    assert_eq!(repo.find_by_id("u_other", &created.id).await.unwrap(), None);
}

#[sqlx::test]
async fn test_list_with_search_and_count(pool: PgPool) {
    let pool = Arc::new(pool);
    let user_id = user(&pool, "kc-1").await;
    let repo = PgHabitRepository::new(pool.clone());
    for name in ["Read books", "Morning run", "Read papers"] {
        repo.create(new_habit(&user_id, name, AutomationSource::None))
            .await
            .unwrap();
    }

    let filter = HabitFilter {
        search: Some("read".to_string()),
        ..HabitFilter::default()
    };
    let habits = repo
        .list(&user_id, &filter, "name ASC", 1, 10)
        .await
        .unwrap();

    assert_eq!(repo.count(&user_id, &filter).await.unwrap(), 2);
    let names: Vec<_> = habits.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, ["Read books", "Read papers"]);
}

#[sqlx::test]
async fn test_replace_and_remove_tags(pool: PgPool) {
    let pool = Arc::new(pool);
    let user_id = user(&pool, "kc-1").await;
    let habits = PgHabitRepository::new(pool.clone());
    let tags = PgTagRepository::new(pool.clone());
    let habit = habits
        .create(new_habit(&user_id, "Read books", AutomationSource::None))
        .await
        .unwrap();

    let mut tag_ids = Vec::new();
    for name in ["focus", "learning"] {
        let tag = tags
            .create(NewTag {
                id: new_id("t"),
                user_id: user_id.clone(),
                name: name.to_string(),
                description: None,
            })
            .await
            .unwrap();
        tag_ids.push(tag.id);
    }

    habits.replace_tags(&habit.id, tag_ids.clone()).await.unwrap();
    assert_eq!(
        habits.tag_names(&habit.id).await.unwrap(),
        ["focus", "learning"]
    );

    assert!(habits.remove_tag(&habit.id, &tag_ids[0]).await.unwrap());
    assert!(!habits.remove_tag(&habit.id, &tag_ids[0]).await.unwrap());
    assert_eq!(habits.tag_ids(&habit.id).await.unwrap(), [tag_ids[1].clone()]);
}

#[sqlx::test]
async fn test_list_automated(pool: PgPool) {
    let pool = Arc::new(pool);
    let user_id = user(&pool, "kc-1").await;
    let repo = PgHabitRepository::new(pool.clone());
    repo.create(new_habit(&user_id, "Read books", AutomationSource::None))
        .await
        .unwrap();
    let automated = repo
        .create(new_habit(&user_id, "Commit code", AutomationSource::GitHub))
        .await
        .unwrap();

    let found = repo.list_automated().await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, automated.id);
}
