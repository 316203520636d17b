use chrono::{Duration, Utc};
use dev_habit::domain::entities::{
    ImportJobProgress, ImportJobStatus, NewImportJob, NewUser, new_id,
};
use dev_habit::domain::repositories::{ImportJobRepository, UserRepository};
use dev_habit::infrastructure::persistence::{PgImportJobRepository, PgUserRepository};
use sqlx::PgPool;
use std::sync::Arc;

async fn setup(pool: PgPool) -> (PgImportJobRepository, String) {
    let pool = Arc::new(pool);
    let user_id = PgUserRepository::new(pool.clone())
        .get_or_create(NewUser::from_identity("kc-1", "a@example.com", None))
        .await
        .unwrap()
        .id;
    (PgImportJobRepository::new(pool), user_id)
}

fn new_job(user_id: &str) -> NewImportJob {
    NewImportJob {
        id: new_id("ei"),
        user_id: user_id.to_string(),
        file_name: "entries.csv".to_string(),
        file_content: b"habit_id,date,value\n".to_vec(),
    }
}

fn finished(status: ImportJobStatus) -> ImportJobProgress {
    ImportJobProgress {
        status,
        total_records: 2,
        processed_records: 2,
        successful_records: 1,
        failed_records: 1,
        errors: vec!["row 2: habit not found".to_string()],
        completed_at_utc: Some(Utc::now()),
    }
}

#[sqlx::test]
async fn test_create_starts_pending(pool: PgPool) {
    let (repo, user_id) = setup(pool).await;

    let job = repo.create(new_job(&user_id)).await.unwrap();

    assert_eq!(job.status, ImportJobStatus::Pending);
    assert_eq!(job.file_content, b"habit_id,date,value\n");
    assert_eq!(repo.pending_ids().await.unwrap(), [job.id.clone()]);
    assert!(repo.find_by_id("u_other", &job.id).await.unwrap().is_none());
    assert!(repo.find_for_processing(&job.id).await.unwrap().is_some());
}

#[sqlx::test]
async fn test_update_progress_persists_errors(pool: PgPool) {
    let (repo, user_id) = setup(pool).await;
    let job = repo.create(new_job(&user_id)).await.unwrap();

    repo.update_progress(&job.id, finished(ImportJobStatus::Completed))
        .await
        .unwrap();

    let stored = repo.find_by_id(&user_id, &job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ImportJobStatus::Completed);
    assert_eq!(stored.failed_records, 1);
    assert_eq!(stored.errors, ["row 2: habit not found"]);
    assert!(stored.completed_at_utc.is_some());
    assert!(repo.pending_ids().await.unwrap().is_empty());
}

#[sqlx::test]
async fn test_delete_finished_before_keeps_pending(pool: PgPool) {
    let (repo, user_id) = setup(pool).await;
    let done = repo.create(new_job(&user_id)).await.unwrap();
    let failed = repo.create(new_job(&user_id)).await.unwrap();
    let pending = repo.create(new_job(&user_id)).await.unwrap();
    repo.update_progress(&done.id, finished(ImportJobStatus::Completed))
        .await
        .unwrap();
    repo.update_progress(&failed.id, finished(ImportJobStatus::Failed))
        .await
        .unwrap();

    let removed = repo
        .delete_finished_before(Utc::now() + Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(repo.count(&user_id).await.unwrap(), 1);
    assert_eq!(repo.pending_ids().await.unwrap(), [pending.id]);
}
