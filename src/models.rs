//! Core data model for the generation pipeline.
//!
//! This module provides:
//! - `StageKind` — the fixed, ordered set of pipeline stages
//! - `StageResult` / `StageStatus` — the append-only per-stage record
//! - `JobData` — the queue-level payload wrapping one run's input
//! - `BuildPlan` and its structural validation gate
//! - `MinimalSpec`, `GeneratedFile`, `Classification`

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue-internal job identifier. The generation id remains the stable
/// external identifier; exactly one job id maps to exactly one generation id.
pub type JobId = Uuid;

/// The fixed, ordered set of pipeline stages. Every run executes these in
/// declaration order, stopping at the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    ValidateSpec,
    BuildPlan,
    Design,
    Code,
    ValidateCode,
    Deploy,
    Billing,
}

/// Pipeline execution order. There are no conditional branches and no skip
/// transitions; the runner walks this slice front to back.
pub const STAGE_ORDER: [StageKind; 7] = [
    StageKind::ValidateSpec,
    StageKind::BuildPlan,
    StageKind::Design,
    StageKind::Code,
    StageKind::ValidateCode,
    StageKind::Deploy,
    StageKind::Billing,
];

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidateSpec => "validate_spec",
            Self::BuildPlan => "build_plan",
            Self::Design => "design",
            Self::Code => "code",
            Self::ValidateCode => "validate_code",
            Self::Deploy => "deploy",
            Self::Billing => "billing",
        }
    }

    /// Position of this stage in the fixed order.
    pub fn index(&self) -> usize {
        STAGE_ORDER
            .iter()
            .position(|k| k == self)
            .expect("stage kind present in STAGE_ORDER")
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "validate_spec" => Ok(Self::ValidateSpec),
            "build_plan" => Ok(Self::BuildPlan),
            "design" => Ok(Self::Design),
            "code" => Ok(Self::Code),
            "validate_code" => Ok(Self::ValidateCode),
            "deploy" => Ok(Self::Deploy),
            "billing" => Ok(Self::Billing),
            _ => Err(format!("Invalid stage kind: {}", s)),
        }
    }
}

/// Terminal status of one executed stage.
///
/// `Retrying` and `Skipped` are part of the vocabulary for external
/// consumers; the base runner only ever records `Completed` or `Failed`
/// (retries, if any, happen at whole-run granularity in the queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
    Retrying,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "retrying" => Ok(Self::Retrying),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid stage status: {}", s)),
        }
    }
}

/// Record of one executed stage. Appended to the progress store and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageKind,
    pub status: StageStatus,
    /// Wall-clock duration of the stage in milliseconds.
    pub duration_ms: i64,
    /// Tokens consumed by external agent calls during this stage.
    pub tokens_used: u64,
    /// Cost of external agent calls during this stage, in cents.
    pub cost_cents: u64,
    /// Human-readable summary of what the stage produced.
    pub summary: String,
    pub error: Option<String>,
}

impl StageResult {
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

/// The minimal application specification consumed by the first stage.
///
/// The structured payload is opaque to the pipeline; only the description
/// text is inspected (by the classifier and the validate-spec stage).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinimalSpec {
    /// Free-text description of the desired application.
    pub description: String,
    /// Opaque structured data passed through to the agents.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl MinimalSpec {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            data: serde_json::Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.description.trim().is_empty() && self.data.is_null()
    }
}

/// Queue message payload: everything one run needs as input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    pub generation_id: String,
    pub app_id: String,
    pub org_id: String,
    pub mvs: MinimalSpec,
    pub blueprint_id: String,
    /// Industry overlay applied on top of the blueprint, if any.
    pub industry_overlay: Option<String>,
}

/// An API route declared by the build plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRoute {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
}

/// A UI page declared by the build plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiPage {
    pub name: String,
    pub route: String,
}

/// The structured, validated output of the planning stage, consumed by all
/// later stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Entity/field schema for the generated application's data layer.
    #[serde(default)]
    pub data_schema: serde_json::Value,
    #[serde(default)]
    pub api_routes: Vec<ApiRoute>,
    /// Role -> allowed actions. Must be non-empty for a multi-tenant app.
    #[serde(default)]
    pub permissions: std::collections::BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ui_pages: Vec<UiPage>,
    #[serde(default)]
    pub workflows: Vec<String>,
}

impl BuildPlan {
    /// Structural gate for planner output. A plan is rejected unless it
    /// declares a data schema, at least one API route, a non-empty
    /// permissions matrix, and at least one UI page. No partial plans
    /// proceed downstream.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.data_schema.is_null() {
            problems.push("plan declares no data schema".to_string());
        }
        if self.api_routes.is_empty() {
            problems.push("plan declares no API routes".to_string());
        }
        if self.permissions.is_empty() {
            problems.push("plan has an empty permissions matrix".to_string());
        }
        if self.ui_pages.is_empty() {
            problems.push("plan declares no UI pages".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// One generated source file: a relative path plus its exact content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Output of the classification agent for a free-text description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    pub industry: String,
    pub entities: Vec<String>,
    pub features: Vec<String>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub suggested_blueprint: String,
    pub suggested_overlay: Option<String>,
}
