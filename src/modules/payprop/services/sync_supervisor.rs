use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::payprop::models::{JobState, JobStatus, SyncKind, SyncSummary};
use crate::modules::payprop::services::payment_sync::PaymentSyncJob;

/// Finished jobs kept for status queries
const MAX_RETAINED_JOBS: usize = 100;

type JobTable = Arc<RwLock<HashMap<Uuid, JobStatus>>>;

/// Runs sync jobs on the tokio runtime and tracks their progress.
///
/// At most one job per [`SyncKind`] is queued or running at any time.
pub struct SyncSupervisor {
    jobs: JobTable,
    payments: Option<Arc<PaymentSyncJob>>,
}

impl SyncSupervisor {
    /// `payments` is `None` when PayProp access is not configured
    pub fn new(payments: Option<Arc<PaymentSyncJob>>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            payments,
        }
    }

    pub async fn start_payment_sync(&self) -> Result<JobStatus> {
        let job = self.payments.clone().ok_or_else(|| {
            AppError::Configuration("PayProp sync is disabled: no access token".to_string())
        })?;
        self.start(SyncKind::Payments, async move { job.run().await })
            .await
    }

    /// Registers the job as QUEUED and spawns it
    pub async fn start<F>(&self, kind: SyncKind, job: F) -> Result<JobStatus>
    where
        F: Future<Output = Result<SyncSummary>> + Send + 'static,
    {
        let status = {
            let mut jobs = self.jobs.write().await;
            if let Some(active) = jobs
                .values()
                .find(|j| j.kind == kind && j.state.is_active())
            {
                return Err(AppError::conflict(format!(
                    "{} sync is already in progress as job {}",
                    kind.as_str(),
                    active.id
                )));
            }
            prune_finished(&mut jobs);
            let status = JobStatus::queued(kind);
            jobs.insert(status.id, status.clone());
            status
        };

        let jobs = Arc::clone(&self.jobs);
        let id = status.id;
        tokio::spawn(async move {
            update(&jobs, id, |s| {
                s.state = JobState::Running;
                s.started_at = Some(Utc::now());
            })
            .await;
            info!(job_id = %id, kind = kind.as_str(), "Sync job started");

            let state = match tokio::spawn(job).await {
                Ok(Ok(summary)) => JobState::Completed { summary },
                Ok(Err(e)) => JobState::Failed {
                    error: e.to_string(),
                },
                Err(join_error) if join_error.is_panic() => JobState::Failed {
                    error: "Sync job panicked".to_string(),
                },
                Err(join_error) => JobState::Failed {
                    error: join_error.to_string(),
                },
            };

            match &state {
                JobState::Failed { error } => {
                    error!(job_id = %id, kind = kind.as_str(), error = %error, "Sync job failed")
                }
                _ => info!(job_id = %id, kind = kind.as_str(), "Sync job completed"),
            }

            update(&jobs, id, |s| {
                s.state = state;
                s.finished_at = Some(Utc::now());
            })
            .await;
        });

        Ok(status)
    }

    pub async fn status(&self, id: Uuid) -> Result<JobStatus> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Sync job {}", id)))
    }

    /// Newest first
    pub async fn list(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.queued_at.cmp(&a.queued_at));
        jobs
    }
}

async fn update(jobs: &JobTable, id: Uuid, apply: impl FnOnce(&mut JobStatus)) {
    if let Some(status) = jobs.write().await.get_mut(&id) {
        apply(status);
    }
}

fn prune_finished(jobs: &mut HashMap<Uuid, JobStatus>) {
    if jobs.len() < MAX_RETAINED_JOBS {
        return;
    }
    let mut finished: Vec<(Uuid, chrono::DateTime<Utc>)> = jobs
        .values()
        .filter(|j| !j.state.is_active())
        .map(|j| (j.id, j.queued_at))
        .collect();
    finished.sort_by_key(|(_, queued_at)| *queued_at);
    let excess = jobs.len() + 1 - MAX_RETAINED_JOBS;
    for (id, _) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
}
