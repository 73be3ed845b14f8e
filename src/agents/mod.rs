//! External collaborator contracts.
//!
//! Every agent response is untrusted input: callers validate the typed
//! output against its expected structure before merging anything into the
//! pipeline context. Only the input/output contracts live here; prompting
//! and model selection belong to the implementations.

pub mod classify;
pub mod scripted;

use async_trait::async_trait;

use crate::models::{BuildPlan, Classification, GeneratedFile, MinimalSpec};

pub use classify::KeywordClassifier;
pub use scripted::{ScriptedBilling, ScriptedCoder, ScriptedDeployer, ScriptedPlanner};

/// Token and cost accounting for one external agent call.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentUsage {
    pub tokens: u64,
    pub cost_cents: u64,
}

/// Typed agent output plus its usage accounting.
#[derive(Debug, Clone)]
pub struct AgentResponse<T> {
    pub value: T,
    pub usage: AgentUsage,
}

impl<T> AgentResponse<T> {
    pub fn new(value: T, usage: AgentUsage) -> Self {
        Self { value, usage }
    }

    /// A response with zero recorded usage (fixtures, cache hits).
    pub fn free(value: T) -> Self {
        Self {
            value,
            usage: AgentUsage::default(),
        }
    }
}

/// Produces a structured build plan from the minimal specification.
#[async_trait]
pub trait PlannerAgent: Send + Sync {
    async fn plan(
        &self,
        mvs: &MinimalSpec,
        blueprint_id: &str,
        industry_overlay: Option<&str>,
    ) -> anyhow::Result<AgentResponse<BuildPlan>>;
}

/// Produces an ordered list of generated files from a validated plan.
#[async_trait]
pub trait CoderAgent: Send + Sync {
    async fn generate(&self, plan: &BuildPlan) -> anyhow::Result<AgentResponse<Vec<GeneratedFile>>>;
}

/// Classifies a free-text description into intent, industry and a
/// suggested blueprint.
#[async_trait]
pub trait ClassifierAgent: Send + Sync {
    async fn classify(&self, text: &str) -> anyhow::Result<AgentResponse<Classification>>;
}

/// Deploys an emitted run directory. Opaque to the pipeline; only the
/// resulting URL matters here.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(
        &self,
        app_id: &str,
        generation_id: &str,
        run_dir: &std::path::Path,
    ) -> anyhow::Result<String>;
}

/// Provisions billing for a deployed application. Opaque to the pipeline.
#[async_trait]
pub trait BillingProvisioner: Send + Sync {
    async fn provision(&self, app_id: &str, org_id: &str) -> anyhow::Result<()>;
}
