//! The stage handler contract.

use async_trait::async_trait;

use crate::errors::StageError;
use crate::models::StageKind;
use crate::pipeline::context::GenContext;

/// What a successful stage reports back to the runner.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Human-readable summary for the stage result.
    pub summary: String,
    /// Tokens consumed by external agent calls.
    pub tokens_used: u64,
    /// Cost of external agent calls, in cents.
    pub cost_cents: u64,
}

impl StageOutput {
    /// Output for a stage that made no external calls.
    pub fn local(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            tokens_used: 0,
            cost_cents: 0,
        }
    }

    pub fn with_usage(summary: impl Into<String>, tokens_used: u64, cost_cents: u64) -> Self {
        Self {
            summary: summary.into(),
            tokens_used,
            cost_cents,
        }
    }
}

/// One unit of pipeline work with a fixed position in the execution order.
///
/// Contract: a handler validates its own preconditions before doing
/// expensive work, may perform side effects (agent calls, file emission),
/// and must not touch context fields outside the ones it owns. Failures
/// are stage-scoped and distinguish precondition, validation and
/// external-call errors.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError>;
}
