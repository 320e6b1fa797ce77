use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type StepId = String;

/// Minimum length of a step id or label accepted by the plan store.
pub const MIN_STEP_LEN: usize = 3;

/// Lifecycle of a single step. The engine reads and writes this field
/// but never drives transitions; the action executor does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ready,
    InProgress,
    Done,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanStep {
    pub id: StepId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            intent: None,
            status: Some(StepStatus::Ready),
        }
    }

    pub fn has_valid_id(&self) -> bool {
        self.id.trim().chars().count() >= MIN_STEP_LEN
    }

    pub fn has_valid_label(&self) -> bool {
        self.label.trim().chars().count() >= MIN_STEP_LEN
    }

    pub fn is_open(&self) -> bool {
        self.status != Some(StepStatus::Done)
    }
}

/// The tracked goal record surfaced to the user and the UI.
///
/// Every field defaults so that half-formed model payloads still decode;
/// the heal pass is responsible for filling the gaps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanState {
    pub plan_id: Option<String>,
    pub goal: String,
    pub context_summary: String,
    pub progress: String,
    pub steps: Vec<PlanStep>,
    pub next_steps: Vec<PlanStep>,
    pub current_step_id: Option<StepId>,
    pub blocked_by: Option<String>,
    pub observation_ids: Vec<String>,
    pub confidence: f64, // 0.0 - 1.0
    pub updated_at: Option<DateTime<Utc>>,
    pub state_tag: Option<String>,
}

impl PlanState {
    /// A bare plan carrying only a goal. Steps, ids and tags are filled in
    /// by normalization.
    pub fn with_goal(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            confidence: 0.5,
            ..Self::default()
        }
    }

    /// A goal with exactly one ready step, which is also the current step.
    pub fn scaffold(goal: impl Into<String>, step: PlanStep) -> Self {
        let current = step.id.clone();
        Self {
            goal: goal.into(),
            steps: vec![step.clone()],
            next_steps: vec![step],
            current_step_id: Some(current),
            confidence: 0.5,
            ..Self::default()
        }
    }

    /// Current step id, if one is set and non-blank.
    pub fn current_step(&self) -> Option<&str> {
        self.current_step_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn find_step(&self, id: &str) -> Option<&PlanStep> {
        self.steps
            .iter()
            .chain(self.next_steps.iter())
            .find(|s| s.id == id)
    }
}
