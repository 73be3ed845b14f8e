//! Durable in-process job queue.
//!
//! One job per generation request. Job data persists until the run is
//! acknowledged (completed or failed and recorded) or its retention window
//! expires: completed jobs are pruned after a short window, failed jobs are
//! retained substantially longer to permit inspection.
//!
//! Delivery policy: the abstraction is at-least-once, but this queue is
//! configured for exactly one delivery attempt with no automatic
//! re-delivery on failure (fail-fast). Whole-run retry is a caller-level
//! re-enqueue.
//!
//! The queue is an explicitly constructed, explicitly shut down resource
//! shared by all workers; there are no process-wide singletons.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::QueueError;
use crate::models::{JobData, JobId};

/// How long acknowledged job data is retained before pruning.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub completed: Duration,
    pub failed: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed: Duration::hours(1),
            failed: Duration::days(7),
        }
    }
}

/// Lifecycle of one job inside the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Waiting for a worker.
    Queued,
    /// Handed to a worker, not yet acknowledged.
    Delivered,
    /// Acknowledged as completed.
    Completed,
    /// Acknowledged as failed; the error is kept for inspection.
    Failed { error: String },
}

#[derive(Debug, Clone)]
struct JobRecord {
    id: JobId,
    data: JobData,
    state: JobState,
    enqueued_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// What a worker receives from `dequeue`.
#[derive(Debug, Clone)]
pub struct JobDelivery {
    pub job_id: JobId,
    pub data: JobData,
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<JobId>,
    jobs: HashMap<JobId, JobRecord>,
    by_generation: HashMap<String, JobId>,
    closed: bool,
}

/// Shared, durable job queue.
#[derive(Debug)]
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    retention: RetentionPolicy,
}

impl JobQueue {
    pub fn new(retention: RetentionPolicy) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
            retention,
        })
    }

    /// Enqueue one generation request. Returns the queue-internal job id.
    /// Exactly one job id maps to exactly one generation id; a duplicate
    /// generation id is rejected while its job is still retained.
    pub async fn enqueue(&self, data: JobData) -> Result<JobId, QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(QueueError::Closed);
        }
        if inner.by_generation.contains_key(&data.generation_id) {
            return Err(QueueError::DuplicateGeneration {
                generation_id: data.generation_id.clone(),
            });
        }

        let id = Uuid::new_v4();
        inner
            .by_generation
            .insert(data.generation_id.clone(), id);
        inner.jobs.insert(
            id,
            JobRecord {
                id,
                data,
                state: JobState::Queued,
                enqueued_at: Utc::now(),
                finished_at: None,
            },
        );
        inner.pending.push_back(id);
        drop(inner);

        self.notify.notify_one();
        Ok(id)
    }

    /// Wait for the next available job. Returns `None` once the queue is
    /// closed and drained. The queue's delivery bookkeeping guarantees no
    /// two workers hold the same job simultaneously.
    pub async fn dequeue(&self) -> Option<JobDelivery> {
        loop {
            // Register for the wakeup before re-checking state, so a
            // notify between the check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                if let Some(id) = inner.pending.pop_front() {
                    let record = inner.jobs.get_mut(&id).expect("pending id has a record");
                    record.state = JobState::Delivered;
                    let waited_ms = (Utc::now() - record.enqueued_at).num_milliseconds();
                    debug!(
                        job_id = %id,
                        generation_id = %record.data.generation_id,
                        waited_ms,
                        "job delivered"
                    );
                    return Some(JobDelivery {
                        job_id: id,
                        data: record.data.clone(),
                    });
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Acknowledge a delivered job as completed.
    pub async fn ack_completed(&self, job_id: JobId) -> Result<(), QueueError> {
        self.ack(job_id, JobState::Completed).await
    }

    /// Acknowledge a delivered job as failed. The job is not re-delivered;
    /// its record is retained under the longer failure window.
    pub async fn ack_failed(&self, job_id: JobId, error: &str) -> Result<(), QueueError> {
        self.ack(
            job_id,
            JobState::Failed {
                error: error.to_string(),
            },
        )
        .await
    }

    async fn ack(&self, job_id: JobId, state: JobState) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .jobs
            .get_mut(&job_id)
            .ok_or(QueueError::JobNotFound { job_id })?;
        if record.state != JobState::Delivered {
            return Err(QueueError::InvalidJobState { job_id });
        }
        record.state = state;
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Resolve the job id for a generation, if its job is still retained.
    pub async fn lookup(&self, generation_id: &str) -> Option<JobId> {
        let inner = self.inner.lock().await;
        inner.by_generation.get(generation_id).copied()
    }

    /// Current state of a job, if retained.
    pub async fn job_state(&self, job_id: JobId) -> Option<JobState> {
        let inner = self.inner.lock().await;
        inner.jobs.get(&job_id).map(|r| r.state.clone())
    }

    /// Drop acknowledged jobs whose retention window has expired.
    /// Returns the generation ids of the pruned jobs so callers can
    /// retire related state.
    pub async fn prune(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let retention = self.retention;
        let expired: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|r| {
                let Some(finished) = r.finished_at else {
                    return false;
                };
                match &r.state {
                    JobState::Completed => now - finished > retention.completed,
                    JobState::Failed { .. } => now - finished > retention.failed,
                    _ => false,
                }
            })
            .map(|r| r.id)
            .collect();

        let mut generation_ids = Vec::with_capacity(expired.len());
        for id in &expired {
            if let Some(record) = inner.jobs.remove(id) {
                inner.by_generation.remove(&record.data.generation_id);
                generation_ids.push(record.data.generation_id);
            }
        }
        if !generation_ids.is_empty() {
            info!(pruned = generation_ids.len(), "pruned retained jobs");
        }
        generation_ids
    }

    /// Number of jobs waiting for a worker.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Close the queue: rejects further enqueues and wakes every blocked
    /// consumer so it can observe the drained queue and exit.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.closed = true;
        drop(inner);
        self.notify.notify_waiters();
    }
}
