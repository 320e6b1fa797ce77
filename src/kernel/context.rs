use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::plan::{PlanState, PlanStep};

/// Contract violations in the caller-supplied context. These are programmer
/// errors; malformed model output is never reported through this type.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("engine context has an empty run id")]
    MissingRunId,
    #[error("context timestamp {0} predates the unix epoch")]
    TimestampBeforeEpoch(DateTime<Utc>),
    #[error("plan confidence {0} is outside 0..=1")]
    ConfidenceOutOfRange(f64),
    #[error("malformed engine context: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    #[default]
    Normal,
    PlanOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIntent {
    pub intent: String,
    #[serde(default)]
    pub hints: Map<String, Value>,
}

impl DetectedIntent {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            hints: Map::new(),
        }
    }

    pub fn has_hint(&self, key: &str) -> bool {
        self.hints.get(key).is_some_and(|v| !v.is_null())
    }

    /// `choices` hint rendered as a comma separated list.
    pub fn choices(&self) -> Option<String> {
        let items: Vec<String> = match self.hints.get("choices")? {
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Value::String(s) => vec![s.clone()],
            _ => return None,
        };
        if items.is_empty() {
            None
        } else {
            Some(items.join(", "))
        }
    }
}

/// Immutable per-turn input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineContext {
    #[serde(default)]
    pub plan_state: Option<PlanState>,
    #[serde(default)]
    pub pending_steps: Vec<PlanStep>,
    #[serde(default)]
    pub detected_intent: Option<DetectedIntent>,
    #[serde(default)]
    pub user_message: String,
    pub run_id: String,
    pub now: DateTime<Utc>,
    #[serde(default)]
    pub plan_budget_exhausted: bool,
    #[serde(default)]
    pub prompt_mode: PromptMode,
}

impl EngineContext {
    pub fn new(run_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            plan_state: None,
            pending_steps: Vec::new(),
            detected_intent: None,
            user_message: String::new(),
            run_id: run_id.into(),
            now,
            plan_budget_exhausted: false,
            prompt_mode: PromptMode::Normal,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ContextError> {
        let ctx: Self = serde_json::from_str(raw)?;
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn from_value(value: Value) -> Result<Self, ContextError> {
        let ctx: Self = serde_json::from_value(value)?;
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn with_plan(mut self, plan: PlanState) -> Self {
        self.plan_state = Some(plan);
        self
    }

    pub fn with_intent(mut self, intent: DetectedIntent) -> Self {
        self.detected_intent = Some(intent);
        self
    }

    pub fn with_mode(mut self, mode: PromptMode) -> Self {
        self.prompt_mode = mode;
        self
    }

    pub fn with_pending(mut self, steps: Vec<PlanStep>) -> Self {
        self.pending_steps = steps;
        self
    }

    pub fn with_budget_exhausted(mut self, exhausted: bool) -> Self {
        self.plan_budget_exhausted = exhausted;
        self
    }

    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.user_message = message.into();
        self
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.run_id.trim().is_empty() {
            return Err(ContextError::MissingRunId);
        }
        if self.now.timestamp_millis() < 0 {
            return Err(ContextError::TimestampBeforeEpoch(self.now));
        }
        if let Some(plan) = &self.plan_state {
            if !plan.confidence.is_finite() || !(0.0..=1.0).contains(&plan.confidence) {
                return Err(ContextError::ConfidenceOutOfRange(plan.confidence));
            }
        }
        Ok(())
    }

    pub fn intent(&self) -> Option<&str> {
        self.detected_intent.as_ref().map(|d| d.intent.as_str())
    }

    pub fn is_plan_only(&self) -> bool {
        self.prompt_mode == PromptMode::PlanOnly
    }

    /// Plan's current step, else first pending step, else `fallback`.
    pub fn current_step_id(&self, fallback: &str) -> String {
        self.plan_state
            .as_ref()
            .and_then(|p| p.current_step())
            .or_else(|| {
                self.pending_steps
                    .iter()
                    .map(|s| s.id.trim())
                    .find(|id| !id.is_empty())
            })
            .unwrap_or(fallback)
            .to_string()
    }
}
