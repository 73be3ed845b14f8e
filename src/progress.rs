//! Persisted, queryable progress per generation.
//!
//! The store appends stage results atomically and recomputes the derived
//! fields (current stage, stage index, overall status) on every append.
//! Overall status is never set directly: it is `Running` until either all
//! stages have completed results (`Completed`) or any result is failed
//! (`Failed`).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ProgressError;
use crate::models::{JobData, STAGE_ORDER, StageKind, StageResult, StageStatus};

/// Derived overall status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// The queryable aggregate for one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub generation_id: String,
    pub app_id: String,
    pub org_id: String,
    pub app_name: String,
    /// The stage currently executing (the next one to produce a result),
    /// `None` once the run is terminal.
    pub current_stage: Option<StageKind>,
    /// Monotonically non-decreasing within a run; resets only on a new run.
    pub stage_index: usize,
    pub total_stages: usize,
    pub results: Vec<StageResult>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deploy_url: Option<String>,
    pub log_lines: Vec<String>,
    pub tokens_used: u64,
    pub cost_cents: u64,
    pub duration_ms: i64,
    pub error: Option<String>,
    /// Mean completed-stage duration extrapolated over remaining stages.
    pub estimated_remaining_ms: Option<i64>,
}

impl GenerationProgress {
    fn new(job: &JobData, app_name: &str) -> Self {
        Self {
            generation_id: job.generation_id.clone(),
            app_id: job.app_id.clone(),
            org_id: job.org_id.clone(),
            app_name: app_name.to_string(),
            current_stage: Some(STAGE_ORDER[0]),
            stage_index: 0,
            total_stages: STAGE_ORDER.len(),
            results: Vec::new(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            deploy_url: None,
            log_lines: vec!["generation queued".to_string()],
            tokens_used: 0,
            cost_cents: 0,
            duration_ms: 0,
            error: None,
            estimated_remaining_ms: None,
        }
    }

    /// Append one result and recompute every derived field.
    fn apply(&mut self, result: StageResult) {
        self.tokens_used += result.tokens_used;
        self.cost_cents += result.cost_cents;
        self.duration_ms += result.duration_ms;

        match result.status {
            StageStatus::Failed => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown stage error".to_string());
                self.log_lines
                    .push(format!("{} failed: {}", result.stage, message));
                self.error = Some(message);
            }
            _ => {
                self.log_lines.push(format!(
                    "{} {} in {}ms: {}",
                    result.stage,
                    result.status.as_str(),
                    result.duration_ms,
                    result.summary
                ));
            }
        }

        self.results.push(result);
        self.stage_index = self.results.len().min(self.total_stages - 1);

        let failed = self
            .results
            .iter()
            .any(|r| r.status == StageStatus::Failed);
        self.status = if failed {
            RunStatus::Failed
        } else if self.results.len() == self.total_stages {
            RunStatus::Completed
        } else {
            RunStatus::Running
        };

        if self.status.is_terminal() {
            self.current_stage = None;
            self.completed_at = Some(Utc::now());
            self.estimated_remaining_ms = None;
        } else {
            self.current_stage = Some(STAGE_ORDER[self.results.len()]);
            let done = self.results.len() as i64;
            let remaining = (self.total_stages - self.results.len()) as i64;
            self.estimated_remaining_ms = Some(self.duration_ms / done * remaining);
        }
    }
}

/// Shared, serialized store of per-generation progress.
///
/// Appends for different generation ids never cross-write; within one run
/// only the owning worker appends, but the store serializes regardless.
#[derive(Debug, Default)]
pub struct ProgressStore {
    inner: Mutex<HashMap<String, GenerationProgress>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run. Called at enqueue time so status queries resolve
    /// immediately after submission. A second call for the same generation
    /// id resets the run (stage index resets only on a new run).
    pub fn start_run(&self, job: &JobData, app_name: &str) -> Result<(), ProgressError> {
        let mut inner = self.inner.lock().map_err(|_| ProgressError::LockPoisoned)?;
        if inner.contains_key(&job.generation_id) {
            warn!(generation_id = %job.generation_id, "restarting existing run");
        }
        inner.insert(
            job.generation_id.clone(),
            GenerationProgress::new(job, app_name),
        );
        Ok(())
    }

    /// Register the run only if it is not already known. Used by the worker
    /// when a job arrives whose submission-time registration is missing
    /// (crash-redelivery under at-least-once semantics).
    pub fn ensure_run(&self, job: &JobData, app_name: &str) -> Result<(), ProgressError> {
        let mut inner = self.inner.lock().map_err(|_| ProgressError::LockPoisoned)?;
        inner
            .entry(job.generation_id.clone())
            .or_insert_with(|| GenerationProgress::new(job, app_name));
        Ok(())
    }

    /// Atomically append a stage result and recompute the derived fields.
    pub fn record_stage_result(
        &self,
        generation_id: &str,
        result: StageResult,
    ) -> Result<(), ProgressError> {
        let mut inner = self.inner.lock().map_err(|_| ProgressError::LockPoisoned)?;
        let progress =
            inner
                .get_mut(generation_id)
                .ok_or_else(|| ProgressError::UnknownGeneration {
                    generation_id: generation_id.to_string(),
                })?;
        progress.apply(result);
        Ok(())
    }

    /// Attach the deploy URL produced by the deploy stage.
    pub fn record_deploy_url(
        &self,
        generation_id: &str,
        url: &str,
    ) -> Result<(), ProgressError> {
        let mut inner = self.inner.lock().map_err(|_| ProgressError::LockPoisoned)?;
        let progress =
            inner
                .get_mut(generation_id)
                .ok_or_else(|| ProgressError::UnknownGeneration {
                    generation_id: generation_id.to_string(),
                })?;
        progress.deploy_url = Some(url.to_string());
        Ok(())
    }

    pub fn get_progress(&self, generation_id: &str) -> Option<GenerationProgress> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.get(generation_id).cloned())
    }

    /// Remove a run's progress. Retention is driven by the queue's pruning.
    pub fn remove(&self, generation_id: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.remove(generation_id);
        }
    }
}
