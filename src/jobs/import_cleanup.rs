//! Daily removal of finished import jobs past their retention period.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::repositories::ImportJobRepository;
use crate::error::AppError;

/// The first `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Deletes completed and failed jobs older than `retention_days`.
pub async fn run_cleanup_once(
    jobs: &dyn ImportJobRepository,
    retention_days: i64,
) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    let removed = jobs.delete_finished_before(cutoff).await?;
    info!(removed, %cutoff, "Import job cleanup finished");
    Ok(removed)
}

/// Sleeps until the next `hour:00` UTC, sweeps, and repeats until `shutdown` changes.
pub async fn run_import_cleanup(
    jobs: Arc<dyn ImportJobRepository>,
    hour: u32,
    retention_days: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(hour, retention_days, "Import cleanup scheduled");

    loop {
        let now = Utc::now();
        let wait = (next_run_after(now, hour) - now)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = run_cleanup_once(jobs.as_ref(), retention_days).await {
                    warn!(error = %e, "Import job cleanup failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("Import cleanup stopped");
}
