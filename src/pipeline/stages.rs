//! The seven stage handlers, in pipeline order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::agents::{BillingProvisioner, CoderAgent, Deployer, PlannerAgent};
use crate::emit::FileEmitter;
use crate::errors::StageError;
use crate::models::StageKind;
use crate::pipeline::context::GenContext;
use crate::pipeline::stage::{StageHandler, StageOutput};

/// Rejects an empty or undecodable minimal specification before anything
/// expensive runs.
pub struct ValidateSpecStage;

#[async_trait]
impl StageHandler for ValidateSpecStage {
    fn kind(&self) -> StageKind {
        StageKind::ValidateSpec
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        if ctx.mvs.is_empty() {
            return Err(StageError::Validation(
                "minimal specification is empty".to_string(),
            ));
        }
        if ctx.blueprint_id.trim().is_empty() {
            return Err(StageError::Validation(
                "no blueprint id on the specification".to_string(),
            ));
        }
        Ok(StageOutput::local(format!(
            "specification accepted for blueprint {}",
            ctx.blueprint_id
        )))
    }
}

/// Calls the planner agent and applies the structural gate. No partial
/// plans proceed downstream.
pub struct BuildPlanStage {
    planner: Arc<dyn PlannerAgent>,
}

impl BuildPlanStage {
    pub fn new(planner: Arc<dyn PlannerAgent>) -> Self {
        Self { planner }
    }
}

#[async_trait]
impl StageHandler for BuildPlanStage {
    fn kind(&self) -> StageKind {
        StageKind::BuildPlan
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        let resp = self
            .planner
            .plan(
                &ctx.mvs,
                &ctx.blueprint_id,
                ctx.industry_overlay.as_deref(),
            )
            .await
            .map_err(StageError::External)?;

        // Planner output is untrusted until it passes the gate.
        if let Err(problems) = resp.value.validate() {
            return Err(StageError::Validation(format!(
                "build plan rejected: {}",
                problems.join("; ")
            )));
        }

        let summary = format!(
            "plan: {} routes, {} pages, {} roles",
            resp.value.api_routes.len(),
            resp.value.ui_pages.len(),
            resp.value.permissions.len()
        );
        ctx.plan = Some(resp.value);
        Ok(StageOutput::with_usage(
            summary,
            resp.usage.tokens,
            resp.usage.cost_cents,
        ))
    }
}

/// Derives design notes from the validated plan. Local work only.
pub struct DesignStage;

#[async_trait]
impl StageHandler for DesignStage {
    fn kind(&self) -> StageKind {
        StageKind::Design
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        let plan = ctx.plan.as_ref().ok_or_else(|| {
            StageError::Precondition("no build plan in context".to_string())
        })?;

        let mut notes = format!("# Design for {}\n\n## Pages\n", ctx.app_id);
        for page in &plan.ui_pages {
            notes.push_str(&format!("- {} ({})\n", page.name, page.route));
        }
        notes.push_str("\n## API\n");
        for route in &plan.api_routes {
            notes.push_str(&format!("- {} {}\n", route.method, route.path));
        }
        let summary = format!("design notes for {} pages", plan.ui_pages.len());
        ctx.design_notes = Some(notes);
        Ok(StageOutput::local(summary))
    }
}

/// Calls the coder agent and emits its files. The precondition check runs
/// before the agent call: with no plan in the context, the stage fails
/// without spending anything.
pub struct CodeStage {
    coder: Arc<dyn CoderAgent>,
    emitter: FileEmitter,
}

impl CodeStage {
    pub fn new(coder: Arc<dyn CoderAgent>, emitter: FileEmitter) -> Self {
        Self { coder, emitter }
    }
}

#[async_trait]
impl StageHandler for CodeStage {
    fn kind(&self) -> StageKind {
        StageKind::Code
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        let plan = ctx.plan.as_ref().ok_or_else(|| {
            StageError::Precondition("no build plan in context".to_string())
        })?;

        let resp = self
            .coder
            .generate(plan)
            .await
            .map_err(StageError::External)?;

        if resp.value.is_empty() {
            return Err(StageError::Validation(
                "coder produced no files".to_string(),
            ));
        }

        let written = self
            .emitter
            .emit_run(&ctx.app_id, &ctx.generation_id, &resp.value)
            .await?;

        info!(
            generation_id = %ctx.generation_id,
            files = written.len(),
            "emitted generated files"
        );
        let summary = format!("emitted {} files", written.len());
        ctx.files = resp.value;
        ctx.emitted_paths = written;
        Ok(StageOutput::with_usage(
            summary,
            resp.usage.tokens,
            resp.usage.cost_cents,
        ))
    }
}

/// Structural sanity checks over the emitted file set.
pub struct ValidateCodeStage;

#[async_trait]
impl StageHandler for ValidateCodeStage {
    fn kind(&self) -> StageKind {
        StageKind::ValidateCode
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        if ctx.files.is_empty() {
            return Err(StageError::Precondition(
                "no generated files in context".to_string(),
            ));
        }
        for (i, a) in ctx.files.iter().enumerate() {
            if a.content.is_empty() {
                return Err(StageError::Validation(format!(
                    "generated file {} is empty",
                    a.path
                )));
            }
            for b in ctx.files.iter().skip(i + 1) {
                if a.path == b.path {
                    return Err(StageError::Validation(format!(
                        "duplicate generated file path: {}",
                        a.path
                    )));
                }
            }
        }
        Ok(StageOutput::local(format!(
            "{} files validated",
            ctx.files.len()
        )))
    }
}

/// Hands the emitted run directory to the deployment collaborator.
pub struct DeployStage {
    deployer: Arc<dyn Deployer>,
    emitter: FileEmitter,
}

impl DeployStage {
    pub fn new(deployer: Arc<dyn Deployer>, emitter: FileEmitter) -> Self {
        Self { deployer, emitter }
    }
}

#[async_trait]
impl StageHandler for DeployStage {
    fn kind(&self) -> StageKind {
        StageKind::Deploy
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        if ctx.emitted_paths.is_empty() {
            return Err(StageError::Precondition(
                "nothing has been emitted to deploy".to_string(),
            ));
        }
        let run_dir = self.emitter.run_dir(&ctx.app_id, &ctx.generation_id);
        let url = self
            .deployer
            .deploy(&ctx.app_id, &ctx.generation_id, &run_dir)
            .await
            .map_err(StageError::External)?;

        if url.trim().is_empty() {
            return Err(StageError::Validation(
                "deployer returned an empty URL".to_string(),
            ));
        }
        let summary = format!("deployed to {}", url);
        ctx.deploy_url = Some(url);
        Ok(StageOutput::local(summary))
    }
}

/// Provisions billing for the deployed tenant.
pub struct BillingStage {
    billing: Arc<dyn BillingProvisioner>,
}

impl BillingStage {
    pub fn new(billing: Arc<dyn BillingProvisioner>) -> Self {
        Self { billing }
    }
}

#[async_trait]
impl StageHandler for BillingStage {
    fn kind(&self) -> StageKind {
        StageKind::Billing
    }

    async fn execute(&self, ctx: &mut GenContext) -> Result<StageOutput, StageError> {
        if ctx.deploy_url.is_none() {
            return Err(StageError::Precondition(
                "application has not been deployed".to_string(),
            ));
        }
        self.billing
            .provision(&ctx.app_id, &ctx.org_id)
            .await
            .map_err(StageError::External)?;
        Ok(StageOutput::local(format!(
            "billing configured for org {}",
            ctx.org_id
        )))
    }
}
