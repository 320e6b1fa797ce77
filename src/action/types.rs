use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::plan::PlanState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PlanStateUpdate,
    TextResponse,
    DomAction,
    ExecuteJsCode,
    FilterSpreadsheet,
    ClarificationRequest,
    PlanCreation,
    ProceedToAnalysis,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::PlanStateUpdate,
        ActionKind::TextResponse,
        ActionKind::DomAction,
        ActionKind::ExecuteJsCode,
        ActionKind::FilterSpreadsheet,
        ActionKind::ClarificationRequest,
        ActionKind::PlanCreation,
        ActionKind::ProceedToAnalysis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::PlanStateUpdate => "plan_state_update",
            ActionKind::TextResponse => "text_response",
            ActionKind::DomAction => "dom_action",
            ActionKind::ExecuteJsCode => "execute_js_code",
            ActionKind::FilterSpreadsheet => "filter_spreadsheet",
            ActionKind::ClarificationRequest => "clarification_request",
            ActionKind::PlanCreation => "plan_creation",
            ActionKind::ProceedToAnalysis => "proceed_to_analysis",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn is_plan(self) -> bool {
        self == ActionKind::PlanStateUpdate
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a DOM action locates the card it operates on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl DomTarget {
    pub fn is_resolved(&self) -> bool {
        [&self.by_id, &self.by_title, &self.selector]
            .into_iter()
            .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomAction {
    pub tool_name: String,
    pub target: DomTarget,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsCode {
    pub js_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Fields the executor may understand that the engine does not.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpreadsheetFilter {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Clarification {
    pub question: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Kind-specific payload. The serde tag doubles as the action's discriminant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    PlanStateUpdate {
        #[serde(rename = "planState")]
        plan_state: PlanState,
    },
    TextResponse {
        text: String,
        #[serde(rename = "awaitUser", default, skip_serializing_if = "is_false")]
        await_user: bool,
        #[serde(rename = "quickReplies", default, skip_serializing_if = "Vec::is_empty")]
        quick_replies: Vec<String>,
    },
    DomAction {
        #[serde(rename = "domAction")]
        dom: DomAction,
    },
    ExecuteJsCode {
        code: JsCode,
    },
    FilterSpreadsheet {
        filter: SpreadsheetFilter,
    },
    ClarificationRequest {
        clarification: Clarification,
    },
    PlanCreation {
        plan: Value,
    },
    ProceedToAnalysis,
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::PlanStateUpdate { .. } => ActionKind::PlanStateUpdate,
            ActionPayload::TextResponse { .. } => ActionKind::TextResponse,
            ActionPayload::DomAction { .. } => ActionKind::DomAction,
            ActionPayload::ExecuteJsCode { .. } => ActionKind::ExecuteJsCode,
            ActionPayload::FilterSpreadsheet { .. } => ActionKind::FilterSpreadsheet,
            ActionPayload::ClarificationRequest { .. } => ActionKind::ClarificationRequest,
            ActionPayload::PlanCreation { .. } => ActionKind::PlanCreation,
            ActionPayload::ProceedToAnalysis => ActionKind::ProceedToAnalysis,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ActionPayload::TextResponse {
            text: text.into(),
            await_user: false,
            quick_replies: Vec::new(),
        }
    }
}

/// One atomic next-step instruction, as handed to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(flatten)]
    pub payload: ActionPayload,
    #[serde(default)]
    pub step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Action {
    pub fn new(payload: ActionPayload) -> Self {
        Self {
            payload,
            step_id: String::new(),
            state_tag: None,
            reason: None,
            meta: None,
        }
    }

    pub fn text(step_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ActionPayload::text(text)).with_step(step_id)
    }

    pub fn plan(plan_state: PlanState) -> Self {
        Self::new(ActionPayload::PlanStateUpdate { plan_state })
    }

    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = step_id.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn is_plan(&self) -> bool {
        self.kind().is_plan()
    }

    pub fn tool_name(&self) -> Option<&str> {
        match &self.payload {
            ActionPayload::DomAction { dom } if !dom.tool_name.trim().is_empty() => {
                Some(dom.tool_name.trim())
            }
            _ => None,
        }
    }

    /// Catalog key, qualified with the tool name when there is one
    /// (e.g. `dom_action.removeCard`).
    pub fn profile_key(&self) -> String {
        match self.tool_name() {
            Some(tool) => format!("{}.{}", self.kind(), tool),
            None => self.kind().as_str().to_string(),
        }
    }

    pub fn plan_state(&self) -> Option<&PlanState> {
        match &self.payload {
            ActionPayload::PlanStateUpdate { plan_state } => Some(plan_state),
            _ => None,
        }
    }

    pub fn plan_state_mut(&mut self) -> Option<&mut PlanState> {
        match &mut self.payload {
            ActionPayload::PlanStateUpdate { plan_state } => Some(plan_state),
            _ => None,
        }
    }

    pub fn response_text(&self) -> Option<&str> {
        match &self.payload {
            ActionPayload::TextResponse { text, .. } => Some(text),
            _ => None,
        }
    }

    /// A text response with nothing to show the user.
    pub fn is_blank(&self) -> bool {
        match &self.payload {
            ActionPayload::TextResponse { text, quick_replies, .. } => {
                text.trim().is_empty() && quick_replies.is_empty()
            }
            _ => false,
        }
    }
}
