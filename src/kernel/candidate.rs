use serde::{Deserialize, Serialize};

use super::context::EngineContext;
use crate::action::{Action, ActionKind};
use crate::catalog::tools::{ToolCatalog, DEFAULT_COST, DEFAULT_LATENCY, DEFAULT_RISK};

const PLAN_UTILITY: f64 = 1.2;
const BASE_UTILITY: f64 = 0.8;
const INTENT_BONUS: f64 = 0.4;
const NO_REASON_CONFIDENCE: f64 = 0.4;
const COST_WEIGHT: f64 = 0.1;

/// Intent -> (kind, tool) pairs that are the expected answer to that intent.
/// A `None` tool matches any tool of the kind.
const INTENT_AFFINITY: [(&str, ActionKind, Option<&str>); 9] = [
    ("remove_card", ActionKind::DomAction, Some("removeCard")),
    ("data_filter", ActionKind::FilterSpreadsheet, None),
    ("data_transform", ActionKind::ExecuteJsCode, None),
    ("clarification", ActionKind::ClarificationRequest, None),
    ("greeting", ActionKind::TextResponse, None),
    ("smalltalk", ActionKind::TextResponse, None),
    ("ask_user_choice", ActionKind::TextResponse, None),
    ("new_analysis", ActionKind::PlanCreation, None),
    ("proceed_analysis", ActionKind::ProceedToAnalysis, None),
];

/// True when the action kind is the fixed expected answer to `intent`.
pub fn has_intent_affinity(intent: &str, action: &Action) -> bool {
    let kind = action.kind();
    let tool = action.tool_name();
    INTENT_AFFINITY.iter().any(|(i, k, t)| {
        *i == intent && *k == kind && t.map_or(true, |t| tool == Some(t))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Model,
    Playbook,
    Middleware,
}

/// An action annotated for selection. Never leaves the engine.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub action: Action,
    pub source: CandidateSource,
    pub utility: f64,
    pub confidence: f64,
    pub cost: f64,
    pub risk: f64,
    pub latency: f64,
    pub score: f64,
}

impl Candidate {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn compute_score(&self) -> f64 {
        self.utility + self.confidence - self.cost * COST_WEIGHT - self.risk - self.latency
    }
}

/// Scores one action against the catalog. Total; never fails.
pub fn derive(
    action: Action,
    source: CandidateSource,
    ctx: &EngineContext,
    catalog: &ToolCatalog,
) -> Candidate {
    let profile = catalog.lookup_action(&action);

    let mut utility = if action.is_plan() { PLAN_UTILITY } else { BASE_UTILITY };
    if let Some(intent) = ctx.intent() {
        let by_profile = profile.is_some_and(|p| p.is_applicable(intent));
        if has_intent_affinity(intent, &action) || by_profile {
            utility += INTENT_BONUS;
        }
    }

    let confidence = match action.reason.as_deref().filter(|r| !r.is_empty()) {
        Some(reason) => (0.5 + reason.chars().count() as f64 / 200.0).min(1.0),
        None => NO_REASON_CONFIDENCE,
    };

    let (cost, risk, latency) = match profile {
        Some(p) => (p.cost_estimate, p.risk.weight(), p.latency_class.weight()),
        None => (DEFAULT_COST, DEFAULT_RISK.weight(), DEFAULT_LATENCY.weight()),
    };

    Candidate {
        action,
        source,
        utility,
        confidence,
        cost,
        risk,
        latency,
        score: 0.0,
    }
}

pub fn derive_all(actions: Vec<Action>, ctx: &EngineContext, catalog: &ToolCatalog) -> Vec<Candidate> {
    actions
        .into_iter()
        .map(|a| derive(a, CandidateSource::Model, ctx, catalog))
        .collect()
}
