//! The mutable record threading through one generation run.

use std::path::PathBuf;

use crate::models::{BuildPlan, GeneratedFile, JobData, MinimalSpec, StageResult};

/// Per-run pipeline context. Owned exclusively by the worker executing the
/// run; created when a job is picked up and discarded when the run
/// terminates. Its durable residue is the stage result list persisted into
/// the progress store.
#[derive(Debug)]
pub struct GenContext {
    pub generation_id: String,
    pub app_id: String,
    pub org_id: String,
    pub mvs: MinimalSpec,
    pub blueprint_id: String,
    pub industry_overlay: Option<String>,

    /// Produced by the build-plan stage. Later stages fail their
    /// precondition check if this is absent.
    pub plan: Option<BuildPlan>,
    /// Produced by the design stage.
    pub design_notes: Option<String>,
    /// Produced by the code stage (agent output, pre-emission).
    pub files: Vec<GeneratedFile>,
    /// Absolute paths written by the code stage.
    pub emitted_paths: Vec<PathBuf>,
    /// Produced by the deploy stage.
    pub deploy_url: Option<String>,

    /// Accumulating per-stage results, appended in pipeline order.
    pub results: Vec<StageResult>,
}

impl GenContext {
    /// Fresh context for one job.
    pub fn from_job(job: &JobData) -> Self {
        Self {
            generation_id: job.generation_id.clone(),
            app_id: job.app_id.clone(),
            org_id: job.org_id.clone(),
            mvs: job.mvs.clone(),
            blueprint_id: job.blueprint_id.clone(),
            industry_overlay: job.industry_overlay.clone(),
            plan: None,
            design_notes: None,
            files: Vec::new(),
            emitted_paths: Vec::new(),
            deploy_url: None,
            results: Vec::new(),
        }
    }
}
