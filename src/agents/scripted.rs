//! Scripted collaborator implementations.
//!
//! Deterministic agents for local runs and tests: they produce plausible
//! typed output without calling any external model. The planner derives a
//! plan from the blueprint, the coder expands a plan into files.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::agents::{
    AgentResponse, AgentUsage, BillingProvisioner, CoderAgent, Deployer, PlannerAgent,
};
use crate::blueprint;
use crate::models::{ApiRoute, BuildPlan, GeneratedFile, MinimalSpec, UiPage};

/// Build a complete plan for a blueprint. Used by the scripted planner and
/// as a test fixture.
pub fn plan_for_blueprint(blueprint_id: &str, mvs: &MinimalSpec) -> BuildPlan {
    let entity = match blueprint_id {
        "pms" => "property",
        "inventory" => "item",
        "booking" => "appointment",
        "helpdesk" => "ticket",
        "invoicing" => "invoice",
        _ => "record",
    };

    let mut permissions = BTreeMap::new();
    permissions.insert("owner".to_string(), vec!["*".to_string()]);
    permissions.insert(
        "member".to_string(),
        vec!["read".to_string(), "create".to_string()],
    );

    BuildPlan {
        data_schema: serde_json::json!({
            entity: { "name": "string", "created_at": "timestamp" },
            "note": { "body": "string", "entity_id": "ref" },
        }),
        api_routes: vec![
            ApiRoute {
                method: "GET".into(),
                path: format!("/api/{}s", entity),
                description: format!("List {}s", entity),
            },
            ApiRoute {
                method: "POST".into(),
                path: format!("/api/{}s", entity),
                description: format!("Create a {}", entity),
            },
        ],
        permissions,
        ui_pages: vec![
            UiPage {
                name: "Dashboard".into(),
                route: "/".into(),
            },
            UiPage {
                name: format!("{entity} list"),
                route: format!("/{}s", entity),
            },
        ],
        workflows: vec![
            format!("notify owner on new {entity}"),
            format!("requested: {}", mvs.description),
        ],
    }
}

/// Planner that derives its plan from the blueprint catalog.
#[derive(Debug, Default)]
pub struct ScriptedPlanner;

#[async_trait]
impl PlannerAgent for ScriptedPlanner {
    async fn plan(
        &self,
        mvs: &MinimalSpec,
        blueprint_id: &str,
        _industry_overlay: Option<&str>,
    ) -> anyhow::Result<AgentResponse<BuildPlan>> {
        if blueprint::get_blueprint(blueprint_id).is_none() {
            anyhow::bail!("unknown blueprint: {}", blueprint_id);
        }
        Ok(AgentResponse::new(
            plan_for_blueprint(blueprint_id, mvs),
            AgentUsage {
                tokens: 1200,
                cost_cents: 3,
            },
        ))
    }
}

/// Coder that expands a plan into a small deterministic file set.
#[derive(Debug, Default)]
pub struct ScriptedCoder;

#[async_trait]
impl CoderAgent for ScriptedCoder {
    async fn generate(&self, plan: &BuildPlan) -> anyhow::Result<AgentResponse<Vec<GeneratedFile>>> {
        let mut files = vec![GeneratedFile {
            path: "schema.json".into(),
            content: serde_json::to_string_pretty(&plan.data_schema)?,
        }];
        for route in &plan.api_routes {
            let slug = route
                .path
                .trim_start_matches("/api/")
                .replace('/', "_");
            files.push(GeneratedFile {
                path: format!("api/{}_{}.ts", route.method.to_lowercase(), slug),
                content: format!(
                    "// {} {}\nexport default function handler() {{}}\n",
                    route.method, route.path
                ),
            });
        }
        for page in &plan.ui_pages {
            let slug: String = page
                .name
                .to_lowercase()
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect();
            files.push(GeneratedFile {
                path: format!("pages/{}.tsx", slug),
                content: format!("// page: {} ({})\n", page.name, page.route),
            });
        }
        Ok(AgentResponse::new(
            files,
            AgentUsage {
                tokens: 5400,
                cost_cents: 11,
            },
        ))
    }
}

/// Deployer that fabricates a tenant URL without touching any provider.
#[derive(Debug, Default)]
pub struct ScriptedDeployer;

#[async_trait]
impl Deployer for ScriptedDeployer {
    async fn deploy(
        &self,
        app_id: &str,
        _generation_id: &str,
        _run_dir: &std::path::Path,
    ) -> anyhow::Result<String> {
        Ok(format!("https://{}.apps.example.dev", app_id))
    }
}

/// Billing provisioner that accepts everything.
#[derive(Debug, Default)]
pub struct ScriptedBilling;

#[async_trait]
impl BillingProvisioner for ScriptedBilling {
    async fn provision(&self, _app_id: &str, _org_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
