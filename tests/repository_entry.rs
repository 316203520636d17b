use chrono::NaiveDate;
use dev_habit::domain::entities::{
    AutomationSource, DailyEntryCount, EntryFilter, EntrySource, Frequency, FrequencyType,
    HabitType, NewEntry, NewHabit, NewUser, Target, new_id,
};
use dev_habit::domain::repositories::{EntryRepository, HabitRepository, UserRepository};
use dev_habit::infrastructure::persistence::{
    PgEntryRepository, PgHabitRepository, PgUserRepository,
};
use sqlx::PgPool;
use std::sync::Arc;

struct Fixture {
    repo: PgEntryRepository,
    habits: PgHabitRepository,
    user_id: String,
    habit_id: String,
}

async fn fixture(pool: PgPool) -> Fixture {
    let pool = Arc::new(pool);
    let user_id = PgUserRepository::new(pool.clone())
        .get_or_create(NewUser::from_identity("kc-1", "a@example.com", None))
        .await
        .unwrap()
        .id;

    let habits = PgHabitRepository::new(pool.clone());
    let habit_id = habits
        .create(NewHabit {
            id: new_id("h"),
            user_id: user_id.clone(),
            name: "Read books".to_string(),
            description: None,
            habit_type: HabitType::Measurable,
            frequency: Frequency {
                frequency_type: FrequencyType::Daily,
                times_per_period: 1,
            },
            target: Target {
                value: 30,
                unit: "pages".to_string(),
            },
            end_date: None,
            milestone_target: None,
            automation_source: AutomationSource::None,
        })
        .await
        .unwrap()
        .id;

    Fixture {
        repo: PgEntryRepository::new(pool),
        habits,
        user_id,
        habit_id,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn new_entry(f: &Fixture, date: NaiveDate, source: EntrySource, external_id: Option<&str>) -> NewEntry {
    NewEntry {
        id: new_id("e"),
        habit_id: f.habit_id.clone(),
        user_id: f.user_id.clone(),
        value: 10,
        notes: None,
        source,
        external_id: external_id.map(str::to_string),
        date,
    }
}

#[sqlx::test]
async fn test_create_touches_habit(pool: PgPool) {
    let f = fixture(pool).await;

    let entry = f
        .repo
        .create(new_entry(&f, day(1), EntrySource::Manual, None))
        .await
        .unwrap();

    assert!(!entry.is_archived);
    let habit = f
        .habits
        .find_by_id(&f.user_id, &f.habit_id)
        .await
        .unwrap()
        .unwrap();
    assert!(habit.last_completed_at_utc.is_some());
}

#[sqlx::test]
async fn test_list_filters_by_date_and_archive(pool: PgPool) {
    let f = fixture(pool).await;
    let batch = vec![
        new_entry(&f, day(1), EntrySource::Manual, None),
        new_entry(&f, day(2), EntrySource::Manual, None),
        new_entry(&f, day(3), EntrySource::Manual, None),
    ];
    let created = f.repo.create_batch(batch).await.unwrap();
    assert_eq!(created.len(), 3);

    assert!(
        f.repo
            .set_archived(&f.user_id, &created[2].id, true)
            .await
            .unwrap()
    );

    let filter = EntryFilter {
        from_date: Some(day(2)),
        is_archived: Some(false),
        ..EntryFilter::default()
    };
    let entries = f
        .repo
        .list(&f.user_id, &filter, "date DESC", 1, 10)
        .await
        .unwrap();

    assert_eq!(f.repo.count(&f.user_id, &filter).await.unwrap(), 1);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date, day(2));
}

#[sqlx::test]
async fn test_daily_counts_skip_archived(pool: PgPool) {
    let f = fixture(pool).await;
    f.repo
        .create_batch(vec![
            new_entry(&f, day(1), EntrySource::Manual, None),
            new_entry(&f, day(1), EntrySource::Manual, None),
            new_entry(&f, day(2), EntrySource::Manual, None),
        ])
        .await
        .unwrap();
    let archived = f
        .repo
        .create(new_entry(&f, day(3), EntrySource::Manual, None))
        .await
        .unwrap();
    f.repo
        .set_archived(&f.user_id, &archived.id, true)
        .await
        .unwrap();

    let counts = f.repo.daily_counts(&f.user_id).await.unwrap();

    assert_eq!(
        counts,
        [
            DailyEntryCount {
                date: day(1),
                count: 2
            },
            DailyEntryCount {
                date: day(2),
                count: 1
            },
        ]
    );
}

#[sqlx::test]
async fn test_existing_external_ids(pool: PgPool) {
    let f = fixture(pool).await;
    f.repo
        .create(new_entry(&f, day(1), EntrySource::Automation, Some("gh-1")))
        .await
        .unwrap();

    let found = f
        .repo
        .existing_external_ids(vec!["gh-1".to_string(), "gh-2".to_string()])
        .await
        .unwrap();

    assert_eq!(found, ["gh-1"]);
    assert!(f.repo.existing_external_ids(vec![]).await.unwrap().is_empty());
}

#[sqlx::test]
async fn test_batch_is_all_or_nothing(pool: PgPool) {
    let f = fixture(pool).await;
    let mut orphan = new_entry(&f, day(2), EntrySource::Manual, None);
    orphan.habit_id = "h_missing".to_string();

    let result = f
        .repo
        .create_batch(vec![new_entry(&f, day(1), EntrySource::Manual, None), orphan])
        .await;

    assert!(result.is_err());
    assert_eq!(
        f.repo
            .count(&f.user_id, &EntryFilter::default())
            .await
            .unwrap(),
        0
    );
}
