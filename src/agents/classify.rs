//! Keyword-based classifier.
//!
//! Maps a free-text description to an industry, a suggested blueprint and
//! detected entities/features. Deliberately heuristic: it runs before any
//! paid agent call and only has to be good enough to seed the minimal
//! specification with a blueprint.

use async_trait::async_trait;

use crate::agents::{AgentResponse, ClassifierAgent};
use crate::models::Classification;

/// One keyword group pointing at a blueprint.
struct BlueprintRule {
    blueprint: &'static str,
    industry: &'static str,
    overlay: Option<&'static str>,
    keywords: &'static [&'static str],
}

const BLUEPRINT_RULES: &[BlueprintRule] = &[
    BlueprintRule {
        blueprint: "pms",
        industry: "real_estate",
        overlay: None,
        keywords: &["rental", "propert", "tenant", "lease", "landlord"],
    },
    BlueprintRule {
        blueprint: "inventory",
        industry: "retail",
        overlay: None,
        keywords: &["inventory", "stock", "warehouse", "sku", "supplier"],
    },
    BlueprintRule {
        blueprint: "booking",
        industry: "services",
        overlay: None,
        keywords: &["booking", "appointment", "schedul", "reservation", "calendar"],
    },
    BlueprintRule {
        blueprint: "crm",
        industry: "sales",
        overlay: None,
        keywords: &["crm", "customer", "lead", "deal", "contact"],
    },
    BlueprintRule {
        blueprint: "helpdesk",
        industry: "support",
        overlay: None,
        keywords: &["ticket", "helpdesk", "support request", "sla"],
    },
    BlueprintRule {
        blueprint: "invoicing",
        industry: "finance",
        overlay: Some("accounting"),
        keywords: &["invoice", "billing", "payment", "receivable"],
    },
];

const ENTITY_KEYWORDS: &[&str] = &[
    "property", "tenant", "lease", "unit", "item", "order", "customer",
    "appointment", "ticket", "invoice", "user", "team",
];

const FEATURE_KEYWORDS: &[(&str, &str)] = &[
    ("report", "reporting"),
    ("notif", "notifications"),
    ("email", "email"),
    ("export", "export"),
    ("dashboard", "dashboard"),
    ("search", "search"),
];

/// Classify a description by keyword matching. Falls back to the `crm`
/// blueprint with low confidence when nothing matches.
pub fn classify_text(text: &str) -> Classification {
    let lower = text.to_lowercase();

    let mut best: Option<(&BlueprintRule, usize)> = None;
    for rule in BLUEPRINT_RULES {
        let hits = rule.keywords.iter().filter(|k| lower.contains(**k)).count();
        if hits > 0 && best.map(|(_, h)| hits > h).unwrap_or(true) {
            best = Some((rule, hits));
        }
    }

    let entities: Vec<String> = ENTITY_KEYWORDS
        .iter()
        .filter(|e| lower.contains(**e))
        .map(|e| e.to_string())
        .collect();

    let features: Vec<String> = FEATURE_KEYWORDS
        .iter()
        .filter(|(k, _)| lower.contains(*k))
        .map(|(_, f)| f.to_string())
        .collect();

    match best {
        Some((rule, hits)) => Classification {
            intent: format!("build a {} application", rule.blueprint),
            industry: rule.industry.to_string(),
            entities,
            features,
            confidence: (0.5 + 0.15 * hits as f64).min(0.95),
            suggested_blueprint: rule.blueprint.to_string(),
            suggested_overlay: rule.overlay.map(str::to_string),
        },
        None => Classification {
            intent: "build a generic business application".to_string(),
            industry: "general".to_string(),
            entities,
            features,
            confidence: 0.2,
            suggested_blueprint: "crm".to_string(),
            suggested_overlay: None,
        },
    }
}

/// `ClassifierAgent` backed by the local keyword tables. Free of charge.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

#[async_trait]
impl ClassifierAgent for KeywordClassifier {
    async fn classify(&self, text: &str) -> anyhow::Result<AgentResponse<Classification>> {
        Ok(AgentResponse::free(classify_text(text)))
    }
}
