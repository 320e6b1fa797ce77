use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::action::{Action, ActionKind};

/// Cost assumed for actions with no catalog entry.
pub const DEFAULT_COST: f64 = 3.0;
pub const DEFAULT_RISK: RiskLevel = RiskLevel::Medium;
pub const DEFAULT_LATENCY: LatencyClass = LatencyClass::Medium;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn weight(self) -> f64 {
        match self {
            RiskLevel::Low => 0.1,
            RiskLevel::Medium => 0.4,
            RiskLevel::High => 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyClass {
    Short,
    Medium,
    Long,
}

impl LatencyClass {
    pub fn weight(self) -> f64 {
        match self {
            LatencyClass::Short => 0.1,
            LatencyClass::Medium => 0.3,
            LatencyClass::Long => 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProfile {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cost_estimate: f64,
    pub latency_class: LatencyClass,
    pub risk: RiskLevel,
    /// Extra intents this profile answers, on top of the fixed affinity
    /// table in the candidate deriver.
    #[serde(default)]
    pub applies_to: Vec<String>,
}

impl ToolProfile {
    fn new(
        name: &str,
        tags: &[&str],
        cost_estimate: f64,
        latency_class: LatencyClass,
        risk: RiskLevel,
        applies_to: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            cost_estimate,
            latency_class,
            risk,
            applies_to: applies_to.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn is_applicable(&self, intent: &str) -> bool {
        self.applies_to.iter().any(|i| i == intent)
    }
}

/// Read-only table of known action kinds, keyed by kind or `kind.tool`.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    profiles: HashMap<String, ToolProfile>,
}

impl ToolCatalog {
    pub fn from_profiles(profiles: impl IntoIterator<Item = ToolProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn builtin() -> Self {
        use LatencyClass as L;
        use RiskLevel as R;

        Self::from_profiles([
            ToolProfile::new("plan_state_update", &["plan", "tracking"], 1.0, L::Short, R::Low, &[]),
            ToolProfile::new(
                "text_response",
                &["chat"],
                1.0,
                L::Short,
                R::Low,
                &["greeting", "smalltalk", "ask_user_choice"],
            ),
            ToolProfile::new(
                "clarification_request",
                &["chat", "question"],
                1.0,
                L::Short,
                R::Low,
                &["clarification"],
            ),
            ToolProfile::new("dom_action", &["ui"], 2.0, L::Short, R::Medium, &[]),
            ToolProfile::new(
                "dom_action.removeCard",
                &["ui", "destructive"],
                1.0,
                L::Short,
                R::Medium,
                &["remove_card"],
            ),
            ToolProfile::new(
                "execute_js_code",
                &["code", "transform"],
                3.0,
                L::Medium,
                R::High,
                &["data_transform"],
            ),
            ToolProfile::new(
                "filter_spreadsheet",
                &["data", "filter"],
                1.0,
                L::Short,
                R::Low,
                &["data_filter"],
            ),
            ToolProfile::new(
                "plan_creation",
                &["analysis"],
                4.0,
                L::Long,
                R::Medium,
                &["new_analysis"],
            ),
            ToolProfile::new(
                "proceed_to_analysis",
                &["analysis"],
                5.0,
                L::Long,
                R::Medium,
                &["proceed_analysis"],
            ),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&ToolProfile> {
        self.profiles.get(key)
    }

    /// Qualified lookup (`dom_action.removeCard`) falling back to the bare kind.
    pub fn lookup(&self, kind: ActionKind, tool: Option<&str>) -> Option<&ToolProfile> {
        tool.and_then(|t| self.profiles.get(&format!("{}.{}", kind, t)))
            .or_else(|| self.profiles.get(kind.as_str()))
    }

    pub fn lookup_action(&self, action: &Action) -> Option<&ToolProfile> {
        self.lookup(action.kind(), action.tool_name())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
