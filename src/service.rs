//! Submission and status query surface.
//!
//! `GenerationService` is the seam between external callers and the
//! pipeline internals: it registers progress and enqueues on submission,
//! and answers organization-scoped status queries. Session management
//! itself is an external concern; callers hand in an already-resolved
//! session, or nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{QueueError, StatusError};
use crate::models::{JobData, JobId, StageKind};
use crate::progress::{ProgressStore, RunStatus};
use crate::queue::JobQueue;

/// An authenticated caller's organization context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub org_id: String,
}

impl Session {
    pub fn new(org_id: &str) -> Self {
        Self {
            org_id: org_id.to_string(),
        }
    }
}

/// Read model returned by the status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub generation_id: String,
    pub app_id: String,
    pub app_name: String,
    pub status: RunStatus,
    pub current_stage: Option<StageKind>,
    pub stage_index: usize,
    pub total_stages: usize,
    pub log_lines: Vec<String>,
    pub cost_cents: u64,
    pub tokens_used: u64,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub deploy_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_remaining_ms: Option<i64>,
}

/// Submission and query facade over the queue and the progress store.
pub struct GenerationService {
    queue: Arc<JobQueue>,
    progress: Arc<ProgressStore>,
}

impl GenerationService {
    pub fn new(queue: Arc<JobQueue>, progress: Arc<ProgressStore>) -> Self {
        Self { queue, progress }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn progress(&self) -> &Arc<ProgressStore> {
        &self.progress
    }

    /// Accept one generation request: enqueue the job, then register its
    /// progress so status queries resolve by the time this returns. A
    /// rejected enqueue never leaves progress behind. If a worker beats
    /// the registration, `ensure_run` keeps the worker's entry.
    pub async fn submit(&self, job: JobData, app_name: &str) -> Result<JobId, QueueError> {
        let generation_id = job.generation_id.clone();
        let job_id = self.queue.enqueue(job.clone()).await?;
        if let Err(e) = self.progress.ensure_run(&job, app_name) {
            tracing::error!(%generation_id, error = %e, "progress registration failed");
        }
        info!(%generation_id, %job_id, "generation submitted");
        Ok(job_id)
    }

    /// Drop queue records past their retention window together with the
    /// matching progress entries. Callers drive the schedule.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let pruned = self.queue.prune(now).await;
        for generation_id in &pruned {
            self.progress.remove(generation_id);
        }
        pruned.len()
    }

    /// Organization-scoped status query.
    ///
    /// No session: unauthorized. Unknown generation id, or one owned by a
    /// different organization: not-found. The two cases are
    /// indistinguishable on purpose.
    pub fn status(
        &self,
        session: Option<&Session>,
        generation_id: &str,
    ) -> Result<GenerationStatus, StatusError> {
        let session = session.ok_or(StatusError::Unauthorized)?;
        let progress = self
            .progress
            .get_progress(generation_id)
            .ok_or(StatusError::NotFound)?;
        if progress.org_id != session.org_id {
            return Err(StatusError::NotFound);
        }

        Ok(GenerationStatus {
            generation_id: progress.generation_id,
            app_id: progress.app_id,
            app_name: progress.app_name,
            status: progress.status,
            current_stage: progress.current_stage,
            stage_index: progress.stage_index,
            total_stages: progress.total_stages,
            log_lines: progress.log_lines,
            cost_cents: progress.cost_cents,
            tokens_used: progress.tokens_used,
            duration_ms: progress.duration_ms,
            error: progress.error,
            deploy_url: progress.deploy_url,
            started_at: progress.started_at,
            completed_at: progress.completed_at,
            estimated_remaining_ms: progress.estimated_remaining_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MinimalSpec;
    use crate::queue::RetentionPolicy;

    fn service() -> GenerationService {
        GenerationService::new(
            JobQueue::new(RetentionPolicy::default()),
            Arc::new(ProgressStore::new()),
        )
    }

    fn job(generation_id: &str, org_id: &str) -> JobData {
        JobData {
            generation_id: generation_id.into(),
            app_id: "app_1".into(),
            org_id: org_id.into(),
            mvs: MinimalSpec::new("rentals"),
            blueprint_id: "pms".into(),
            industry_overlay: None,
        }
    }

    #[tokio::test]
    async fn submit_makes_status_immediately_queryable() {
        let svc = service();
        svc.submit(job("gen_1", "org_1"), "Rentals").await.unwrap();

        let session = Session::new("org_1");
        let status = svc.status(Some(&session), "gen_1").unwrap();
        assert_eq!(status.status, RunStatus::Running);
        assert_eq!(status.current_stage, Some(StageKind::ValidateSpec));
        assert_eq!(status.stage_index, 0);
        assert_eq!(status.app_name, "Rentals");
    }

    #[tokio::test]
    async fn status_without_session_is_unauthorized() {
        let svc = service();
        svc.submit(job("gen_1", "org_1"), "Rentals").await.unwrap();
        assert_eq!(svc.status(None, "gen_1"), Err(StatusError::Unauthorized));
    }

    #[tokio::test]
    async fn foreign_org_sees_not_found() {
        let svc = service();
        svc.submit(job("gen_1", "org_1"), "Rentals").await.unwrap();

        let other = Session::new("org_2");
        assert_eq!(
            svc.status(Some(&other), "gen_1"),
            Err(StatusError::NotFound)
        );
        // Identical to a genuinely unknown id.
        assert_eq!(
            svc.status(Some(&other), "gen_unknown"),
            Err(StatusError::NotFound)
        );
    }

    #[tokio::test]
    async fn pruning_retires_progress_with_the_job() {
        let svc = service();
        svc.submit(job("gen_1", "org_1"), "Rentals").await.unwrap();
        let delivery = svc.queue().dequeue().await.unwrap();
        svc.queue().ack_completed(delivery.job_id).await.unwrap();

        let pruned = svc
            .prune_expired(Utc::now() + chrono::Duration::hours(2))
            .await;
        assert_eq!(pruned, 1);
        let session = Session::new("org_1");
        assert_eq!(
            svc.status(Some(&session), "gen_1"),
            Err(StatusError::NotFound)
        );
    }

    #[tokio::test]
    async fn rejected_submission_leaves_no_progress_behind() {
        let svc = service();
        svc.submit(job("gen_1", "org_1"), "Rentals").await.unwrap();
        let err = svc
            .submit(job("gen_1", "org_1"), "Rentals")
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::DuplicateGeneration { .. }));

        // The original registration survives the rejected duplicate.
        let session = Session::new("org_1");
        assert!(svc.status(Some(&session), "gen_1").is_ok());
    }
}
