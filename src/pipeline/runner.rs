//! Fixed-order pipeline execution.
//!
//! The runner walks the seven stages in declaration order against a fresh
//! context, recording a stage result into the progress store after every
//! stage. The first failure transitions the run to its terminal failed
//! state; no subsequent stage executes and no stage-level retry happens.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::agents::{BillingProvisioner, CoderAgent, Deployer, PlannerAgent};
use crate::emit::FileEmitter;
use crate::models::{JobData, STAGE_ORDER, StageKind, StageResult, StageStatus};
use crate::pipeline::context::GenContext;
use crate::pipeline::stage::StageHandler;
use crate::pipeline::stages::{
    BillingStage, BuildPlanStage, CodeStage, DeployStage, DesignStage, ValidateCodeStage,
    ValidateSpecStage,
};
use crate::progress::ProgressStore;

/// Terminal outcome of one run, as reported back to the worker for queue
/// acknowledgement.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub generation_id: String,
    pub success: bool,
    /// Stage-scoped error message of the failing stage, if any.
    pub error: Option<String>,
}

/// Executes stages in fixed order against a per-run context.
pub struct PipelineRunner {
    handlers: Vec<Box<dyn StageHandler>>,
    progress: Arc<ProgressStore>,
}

impl PipelineRunner {
    /// Assemble the runner from its collaborators. The handler list is the
    /// fixed stage sequence; there are no conditional branches.
    pub fn new(
        planner: Arc<dyn PlannerAgent>,
        coder: Arc<dyn CoderAgent>,
        deployer: Arc<dyn Deployer>,
        billing: Arc<dyn BillingProvisioner>,
        emitter: FileEmitter,
        progress: Arc<ProgressStore>,
    ) -> Self {
        let handlers: Vec<Box<dyn StageHandler>> = vec![
            Box::new(ValidateSpecStage),
            Box::new(BuildPlanStage::new(planner)),
            Box::new(DesignStage),
            Box::new(CodeStage::new(coder, emitter.clone())),
            Box::new(ValidateCodeStage),
            Box::new(DeployStage::new(deployer, emitter)),
            Box::new(BillingStage::new(billing)),
        ];
        debug_assert_eq!(handlers.len(), STAGE_ORDER.len());
        debug_assert!(
            handlers
                .iter()
                .zip(STAGE_ORDER.iter())
                .all(|(h, k)| h.kind() == *k),
            "handler list must match the fixed stage order"
        );
        Self { handlers, progress }
    }

    /// Run the full pipeline for one job. Always returns an outcome; the
    /// terminal state is recorded in the progress store either way.
    pub async fn run(&self, job: &JobData) -> RunOutcome {
        // Normally registered at submission time; redelivered jobs whose
        // registration is missing get one here.
        if let Err(e) = self.progress.ensure_run(job, &job.app_id) {
            error!(generation_id = %job.generation_id, error = %e, "cannot register run");
            return RunOutcome {
                generation_id: job.generation_id.clone(),
                success: false,
                error: Some(e.to_string()),
            };
        }

        let mut ctx = GenContext::from_job(job);
        info!(generation_id = %ctx.generation_id, app_id = %ctx.app_id, "run started");

        for handler in &self.handlers {
            let kind = handler.kind();
            let started = Instant::now();
            let outcome = handler.execute(&mut ctx).await;
            let duration_ms = started.elapsed().as_millis() as i64;

            match outcome {
                Ok(output) => {
                    info!(
                        generation_id = %ctx.generation_id,
                        stage = %kind,
                        duration_ms,
                        "stage completed"
                    );
                    let result = StageResult {
                        stage: kind,
                        status: StageStatus::Completed,
                        duration_ms,
                        tokens_used: output.tokens_used,
                        cost_cents: output.cost_cents,
                        summary: output.summary,
                        error: None,
                    };
                    ctx.results.push(result.clone());
                    self.record(&ctx.generation_id, result);
                    if kind == StageKind::Deploy
                        && let Some(url) = ctx.deploy_url.as_deref()
                        && let Err(e) = self.progress.record_deploy_url(&ctx.generation_id, url)
                    {
                        warn!(generation_id = %ctx.generation_id, error = %e, "deploy URL not recorded");
                    }
                }
                Err(stage_err) => {
                    let message = stage_err.scoped(kind);
                    warn!(
                        generation_id = %ctx.generation_id,
                        stage = %kind,
                        error = %message,
                        "stage failed, run aborted"
                    );
                    let result = StageResult {
                        stage: kind,
                        status: StageStatus::Failed,
                        duration_ms,
                        tokens_used: 0,
                        cost_cents: 0,
                        summary: String::new(),
                        error: Some(message.clone()),
                    };
                    ctx.results.push(result.clone());
                    self.record(&ctx.generation_id, result);
                    return RunOutcome {
                        generation_id: ctx.generation_id.clone(),
                        success: false,
                        error: Some(message),
                    };
                }
            }
        }

        info!(generation_id = %ctx.generation_id, "run completed");
        RunOutcome {
            generation_id: ctx.generation_id.clone(),
            success: true,
            error: None,
        }
    }

    fn record(&self, generation_id: &str, result: StageResult) {
        if let Err(e) = self.progress.record_stage_result(generation_id, result) {
            // The run itself keeps going; a lost progress append only
            // degrades observability.
            error!(generation_id = %generation_id, error = %e, "failed to record stage result");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        AgentResponse, CoderAgent, ScriptedBilling, ScriptedCoder, ScriptedDeployer,
        ScriptedPlanner,
    };
    use crate::models::{BuildPlan, MinimalSpec};
    use crate::progress::RunStatus;
    use async_trait::async_trait;
    use tempfile::tempdir;

    fn job(generation_id: &str) -> JobData {
        JobData {
            generation_id: generation_id.into(),
            app_id: "app_1".into(),
            org_id: "org_1".into(),
            mvs: MinimalSpec::new("manage rental properties"),
            blueprint_id: "pms".into(),
            industry_overlay: None,
        }
    }

    fn scripted_runner(
        output_root: &std::path::Path,
        progress: Arc<ProgressStore>,
    ) -> PipelineRunner {
        PipelineRunner::new(
            Arc::new(ScriptedPlanner),
            Arc::new(ScriptedCoder),
            Arc::new(ScriptedDeployer),
            Arc::new(ScriptedBilling),
            FileEmitter::new(output_root),
            progress,
        )
    }

    #[tokio::test]
    async fn successful_run_executes_all_stages_in_order() {
        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let runner = scripted_runner(dir.path(), Arc::clone(&progress));

        let outcome = runner.run(&job("gen_1")).await;
        assert!(outcome.success);

        let p = progress.get_progress("gen_1").unwrap();
        assert_eq!(p.status, RunStatus::Completed);
        let kinds: Vec<StageKind> = p.results.iter().map(|r| r.stage).collect();
        assert_eq!(kinds, STAGE_ORDER.to_vec());
        assert!(p.deploy_url.as_ref().unwrap().contains("app_1"));
        assert!(p.tokens_used > 0);
    }

    #[tokio::test]
    async fn first_failure_stops_the_run() {
        struct RejectedPlanner;
        #[async_trait]
        impl crate::agents::PlannerAgent for RejectedPlanner {
            async fn plan(
                &self,
                _mvs: &MinimalSpec,
                _blueprint_id: &str,
                _overlay: Option<&str>,
            ) -> anyhow::Result<AgentResponse<BuildPlan>> {
                // Passes nothing: every gate check fails.
                Ok(AgentResponse::free(BuildPlan::default()))
            }
        }

        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let runner = PipelineRunner::new(
            Arc::new(RejectedPlanner),
            Arc::new(ScriptedCoder),
            Arc::new(ScriptedDeployer),
            Arc::new(ScriptedBilling),
            FileEmitter::new(dir.path()),
            Arc::clone(&progress),
        );

        let outcome = runner.run(&job("gen_1")).await;
        assert!(!outcome.success);
        assert!(outcome.error.as_ref().unwrap().starts_with("build_plan:"));

        let p = progress.get_progress("gen_1").unwrap();
        assert_eq!(p.status, RunStatus::Failed);
        // validate_spec completed, build_plan failed, nothing after.
        assert_eq!(p.results.len(), 2);
        assert_eq!(p.results[0].stage, StageKind::ValidateSpec);
        assert_eq!(p.results[1].stage, StageKind::BuildPlan);
        assert_eq!(p.results[1].status, StageStatus::Failed);
        assert!(p.results[1].error.as_ref().unwrap().contains("UI pages"));

        // No files were emitted for the aborted run.
        assert!(!dir.path().join("app_1").join("gen_1").exists());
    }

    #[tokio::test]
    async fn external_failure_is_scoped_to_its_stage() {
        struct BrokenDeployer;
        #[async_trait]
        impl crate::agents::Deployer for BrokenDeployer {
            async fn deploy(
                &self,
                _app_id: &str,
                _generation_id: &str,
                _run_dir: &std::path::Path,
            ) -> anyhow::Result<String> {
                anyhow::bail!("provider timeout")
            }
        }

        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let runner = PipelineRunner::new(
            Arc::new(ScriptedPlanner),
            Arc::new(ScriptedCoder),
            Arc::new(BrokenDeployer),
            Arc::new(ScriptedBilling),
            FileEmitter::new(dir.path()),
            Arc::clone(&progress),
        );

        let outcome = runner.run(&job("gen_1")).await;
        assert!(!outcome.success);
        let msg = outcome.error.unwrap();
        assert!(msg.starts_with("deploy:"));
        assert!(msg.contains("provider timeout"));

        let p = progress.get_progress("gen_1").unwrap();
        // Everything through validate_code completed, deploy failed.
        assert_eq!(p.results.len(), 6);
        assert_eq!(p.results[5].stage, StageKind::Deploy);
        assert_eq!(p.results[5].status, StageStatus::Failed);
    }

    #[tokio::test]
    async fn round_trip_emitted_content_is_byte_identical() {
        let dir = tempdir().unwrap();
        let progress = Arc::new(ProgressStore::new());
        let runner = scripted_runner(dir.path(), Arc::clone(&progress));
        runner.run(&job("gen_1")).await;

        let plan = crate::agents::scripted::plan_for_blueprint(
            "pms",
            &MinimalSpec::new("manage rental properties"),
        );
        let expected = ScriptedCoder.generate(&plan).await.unwrap().value;
        for file in expected {
            let on_disk = std::fs::read(
                dir.path()
                    .join("app_1")
                    .join("gen_1")
                    .join(&file.path),
            )
            .unwrap();
            assert_eq!(on_disk, file.content.as_bytes(), "mismatch for {}", file.path);
        }
    }
}
