use serde::{Deserialize, Serialize};

use super::template::{render, TemplateVars};
use super::tools::{LatencyClass, RiskLevel};

/// Risk and latency classes a playbook refuses to act with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DenyRule {
    pub risk: Vec<RiskLevel>,
    pub latency_class: Vec<LatencyClass>,
}

impl DenyRule {
    pub fn is_empty(&self) -> bool {
        self.risk.is_empty() && self.latency_class.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Governance {
    #[serde(default)]
    pub deny_tools_if: DenyRule,
}

/// A suggested follow-up rendered as a quick reply. When `requires_hint`
/// is set the reply is only offered if the detected intent carries that hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickActionRule {
    pub label: String,
    #[serde(default)]
    pub requires_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playbook {
    pub id: String,
    pub intent: String,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    pub template: String,
    #[serde(default)]
    pub quick_actions: Vec<QuickActionRule>,
    #[serde(default)]
    pub governance: Option<Governance>,
}

impl Playbook {
    pub fn render(&self, vars: &TemplateVars) -> String {
        render(&self.template, vars)
    }

    pub fn quick_replies(&self, has_hint: impl Fn(&str) -> bool) -> Vec<String> {
        self.quick_actions
            .iter()
            .filter(|rule| rule.requires_hint.as_deref().map_or(true, &has_hint))
            .map(|rule| rule.label.clone())
            .collect()
    }

    pub fn deny_rule(&self) -> Option<&DenyRule> {
        self.governance
            .as_ref()
            .map(|g| &g.deny_tools_if)
            .filter(|rule| !rule.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaybookCatalog {
    playbooks: Vec<Playbook>,
}

impl PlaybookCatalog {
    pub fn from_playbooks(playbooks: Vec<Playbook>) -> Self {
        Self { playbooks }
    }

    pub fn builtin() -> Self {
        Self::from_playbooks(vec![
            Playbook {
                id: "greeting_welcome".to_string(),
                intent: "greeting".to_string(),
                success_criteria: vec![
                    "User is greeted".to_string(),
                    "User knows what the assistant can do".to_string(),
                ],
                template: "Hi there! I can profile your CSV, propose analyses and build charts. \
                           What would you like to look at first?"
                    .to_string(),
                quick_actions: vec![
                    QuickActionRule {
                        label: "Suggest an analysis".to_string(),
                        requires_hint: None,
                    },
                    QuickActionRule {
                        label: "Summarize the dataset".to_string(),
                        requires_hint: None,
                    },
                ],
                governance: Some(Governance {
                    deny_tools_if: DenyRule {
                        risk: vec![RiskLevel::High],
                        latency_class: vec![LatencyClass::Long],
                    },
                }),
            },
            Playbook {
                id: "smalltalk_redirect".to_string(),
                intent: "smalltalk".to_string(),
                success_criteria: vec!["Conversation steered back to the data".to_string()],
                template: "Happy to chat! Whenever you're ready, tell me what you'd like to \
                           explore in your data."
                    .to_string(),
                quick_actions: Vec::new(),
                governance: Some(Governance {
                    deny_tools_if: DenyRule {
                        risk: vec![RiskLevel::High],
                        latency_class: vec![LatencyClass::Long],
                    },
                }),
            },
            Playbook {
                id: "ask_user_choice".to_string(),
                intent: "ask_user_choice".to_string(),
                success_criteria: vec!["User picks one of the offered options".to_string()],
                template: "I can go a few ways from here: {{choices}}. Which one should I run?"
                    .to_string(),
                quick_actions: vec![QuickActionRule {
                    label: "Pick for me".to_string(),
                    requires_hint: Some("choices".to_string()),
                }],
                governance: Some(Governance {
                    deny_tools_if: DenyRule {
                        risk: vec![RiskLevel::Medium],
                        latency_class: vec![LatencyClass::Long],
                    },
                }),
            },
            Playbook {
                id: "clarify_request".to_string(),
                intent: "clarification".to_string(),
                success_criteria: vec!["Ambiguity resolved before acting".to_string()],
                template: "Could you tell me a bit more about what you mean by \"{{user_message}}\"?"
                    .to_string(),
                quick_actions: Vec::new(),
                governance: Some(Governance {
                    deny_tools_if: DenyRule {
                        risk: vec![RiskLevel::Medium],
                        latency_class: Vec::new(),
                    },
                }),
            },
            Playbook {
                id: "filter_guard".to_string(),
                intent: "data_filter".to_string(),
                success_criteria: vec!["Sheet filtered without side effects".to_string()],
                template: "Filtering the sheet toward: {{goal}}".to_string(),
                quick_actions: Vec::new(),
                governance: Some(Governance {
                    deny_tools_if: DenyRule {
                        risk: vec![RiskLevel::High],
                        latency_class: vec![LatencyClass::Long],
                    },
                }),
            },
        ])
    }

    pub fn find(&self, intent: &str) -> Option<&Playbook> {
        self.playbooks.iter().find(|p| p.intent == intent)
    }

    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }
}
