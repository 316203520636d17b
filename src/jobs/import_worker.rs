//! Consumer of the CSV import queue.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::application::services::ImportService;
use crate::domain::repositories::ImportJobRepository;

/// Processes queued job ids one at a time until the channel closes or
/// `shutdown` changes.
pub async fn run_import_worker(
    mut rx: mpsc::Receiver<String>,
    service: Arc<ImportService>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Import worker started");

    loop {
        tokio::select! {
            job_id = rx.recv() => {
                let Some(job_id) = job_id else { break };
                if let Err(e) = service.process(&job_id).await {
                    warn!(job_id, error = %e, "Import job processing failed");
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("Import worker stopped");
}

/// Puts jobs left `Pending` by a previous run back on the queue.
pub async fn requeue_pending(jobs: &dyn ImportJobRepository, service: &ImportService) {
    match jobs.pending_ids().await {
        Ok(ids) => {
            if !ids.is_empty() {
                info!(count = ids.len(), "Re-enqueueing pending import jobs");
            }
            for id in ids {
                service.enqueue(&id);
            }
        }
        Err(e) => warn!(error = %e, "Failed to load pending import jobs"),
    }
}
