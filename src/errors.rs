//! Typed error hierarchy for the generation pipeline.
//!
//! Three top-level enums cover the three subsystems:
//! - `StageError` — per-stage execution failures
//! - `QueueError` — job queue failures
//! - `StatusError` — status query failures

use thiserror::Error;

use crate::models::StageKind;

/// Errors from a single stage execution.
///
/// The variants separate "precondition not met" (required prior-stage
/// output missing, the stage aborts before doing work) from "external call
/// failed" from "produced output invalid".
#[derive(Debug, Error)]
pub enum StageError {
    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("agent output rejected: {0}")]
    Validation(String),

    #[error("external call failed: {0:#}")]
    External(#[source] anyhow::Error),

    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    /// Render the error prefixed with the owning stage, as surfaced through
    /// the status query.
    pub fn scoped(&self, stage: StageKind) -> String {
        format!("{}: {}", stage.as_str(), self)
    }
}

/// Errors from the job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("generation {generation_id} already has a queued job")]
    DuplicateGeneration { generation_id: String },

    #[error("job {job_id} not found")]
    JobNotFound { job_id: crate::models::JobId },

    #[error("job {job_id} is not in a deliverable state")]
    InvalidJobState { job_id: crate::models::JobId },

    #[error("queue is closed")]
    Closed,
}

/// Errors from the progress store.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("unknown generation {generation_id}")]
    UnknownGeneration { generation_id: String },

    #[error("progress store lock poisoned")]
    LockPoisoned,
}

/// Errors from the status query surface.
///
/// Authorization failures for foreign organizations are deliberately folded
/// into `NotFound` so existence of other tenants' generations never leaks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("generation not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_scoped_names_the_stage() {
        let err = StageError::Precondition("no build plan in context".into());
        let msg = err.scoped(StageKind::Code);
        assert!(msg.starts_with("code:"));
        assert!(msg.contains("precondition not met"));
    }

    #[test]
    fn stage_error_variants_are_distinct() {
        let pre = StageError::Precondition("x".into());
        let val = StageError::Validation("x".into());
        assert!(matches!(pre, StageError::Precondition(_)));
        assert!(matches!(val, StageError::Validation(_)));
        assert!(!matches!(val, StageError::Precondition(_)));
    }

    #[test]
    fn queue_error_duplicate_carries_generation_id() {
        let err = QueueError::DuplicateGeneration {
            generation_id: "gen_1".into(),
        };
        assert!(err.to_string().contains("gen_1"));
    }

    #[test]
    fn status_error_messages_do_not_leak_detail() {
        assert_eq!(StatusError::Unauthorized.to_string(), "unauthorized");
        assert_eq!(StatusError::NotFound.to_string(), "generation not found");
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StageError::Validation("x".into()));
        assert_std_error(&QueueError::Closed);
        assert_std_error(&ProgressError::LockPoisoned);
        assert_std_error(&StatusError::NotFound);
    }
}
