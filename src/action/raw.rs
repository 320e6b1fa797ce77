//! Ingress decoding for model-proposed actions.
//!
//! Model output is loosely shaped: the discriminant may be missing or
//! misspelled, payloads may use non-canonical field names, and individual
//! fields may carry the wrong JSON type. A recognised `kind` is always kept. Decoding here is total. Every input value becomes exactly one
//! typed [`Action`], and [`Coerced::inferred`] records when the kind had to be
//! guessed from the payload shape.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::types::{
    Action, ActionKind, ActionPayload, Clarification, DomAction, JsCode, SpreadsheetFilter,
};
use crate::plan::PlanState;

#[derive(Debug, Clone)]
pub struct Coerced {
    pub action: Action,
    /// Set when no recognised kind was declared and the kind was inferred
    /// from the payload instead.
    pub inferred: Option<ActionKind>,
}

pub fn coerce(value: Value) -> Coerced {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(text) => {
            return Coerced {
                action: Action::new(ActionPayload::text(text)),
                inferred: Some(ActionKind::TextResponse),
            }
        }
        _ => Map::new(),
    };

    let declared = string_field(&obj, "kind")
        .or_else(|| string_field(&obj, "type"))
        .and_then(ActionKind::parse);

    let (payload, inferred) = match declared {
        Some(kind) => (decode_payload(kind, &obj), None),
        None => {
            let payload = infer_payload(&obj);
            debug!(inferred = %payload.kind(), "Inferred action kind from payload");
            let kind = payload.kind();
            (payload, Some(kind))
        }
    };

    let mut action = Action::new(payload);
    action.step_id = step_id_field(&obj);
    action.state_tag = string_field(&obj, "stateTag").map(str::to_string);
    action.reason = string_field(&obj, "reason").map(str::to_string);
    action.meta = obj.get("meta").filter(|v| !v.is_null()).cloned();

    Coerced { action, inferred }
}

/// Payload-shape inference: DOM payload, then code, then analysis plan,
/// otherwise a text response.
fn infer_payload(obj: &Map<String, Value>) -> ActionPayload {
    if obj.get("domAction").is_some_and(Value::is_object) || string_field(obj, "toolName").is_some() {
        return decode_payload(ActionKind::DomAction, obj);
    }
    if obj.get("code").is_some_and(|v| !v.is_null()) {
        return decode_payload(ActionKind::ExecuteJsCode, obj);
    }
    if obj.get("plan").is_some_and(|v| !v.is_null()) {
        return decode_payload(ActionKind::PlanCreation, obj);
    }
    text_payload(obj)
}

/// Builds the payload for a known kind. Unrecognised payload shapes decode
/// to lenient defaults; the kind itself is never changed here.
fn decode_payload(kind: ActionKind, obj: &Map<String, Value>) -> ActionPayload {
    match kind {
        ActionKind::PlanStateUpdate => {
            let plan_state = obj
                .get("planState")
                .and_then(lenient::<PlanState>)
                .unwrap_or_default();
            ActionPayload::PlanStateUpdate { plan_state }
        }
        ActionKind::TextResponse => text_payload(obj),
        ActionKind::DomAction => {
            let dom = match obj.get("domAction") {
                Some(v @ Value::Object(_)) => lenient::<DomAction>(v).unwrap_or_default(),
                _ => lenient::<DomAction>(&Value::Object(obj.clone())).unwrap_or_default(),
            };
            ActionPayload::DomAction { dom }
        }
        ActionKind::ExecuteJsCode => ActionPayload::ExecuteJsCode {
            code: decode_code(obj),
        },
        ActionKind::FilterSpreadsheet => ActionPayload::FilterSpreadsheet {
            filter: decode_filter(obj),
        },
        ActionKind::ClarificationRequest => {
            let clarification = match obj.get("clarification") {
                Some(v @ Value::Object(_)) => lenient::<Clarification>(v).unwrap_or_default(),
                _ => Clarification {
                    question: string_field(obj, "question")
                        .or_else(|| string_field(obj, "text"))
                        .unwrap_or_default()
                        .to_string(),
                    options: Vec::new(),
                },
            };
            ActionPayload::ClarificationRequest { clarification }
        }
        ActionKind::PlanCreation => ActionPayload::PlanCreation {
            plan: obj.get("plan").cloned().unwrap_or(Value::Null),
        },
        ActionKind::ProceedToAnalysis => ActionPayload::ProceedToAnalysis,
    }
}

/// Alternate names models use for the function body.
const JS_SOURCE_KEYS: [&str; 3] = ["jsFunctionBody", "source", "body"];

fn decode_code(obj: &Map<String, Value>) -> JsCode {
    let mut code = match obj.get("code") {
        Some(Value::String(src)) => JsCode {
            js_code: src.clone(),
            ..JsCode::default()
        },
        Some(v @ Value::Object(_)) => lenient::<JsCode>(v).unwrap_or_default(),
        _ => JsCode::default(),
    };
    if code.js_code.trim().is_empty() {
        let lifted = JS_SOURCE_KEYS.iter().find_map(|key| {
            code.extra
                .remove(*key)
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.trim().is_empty())
        });
        if let Some(src) = lifted {
            code.js_code = src;
        }
    }
    code
}

fn decode_filter(obj: &Map<String, Value>) -> SpreadsheetFilter {
    let filter = match obj.get("filter") {
        Some(Value::String(query)) => SpreadsheetFilter {
            query: query.clone(),
        },
        Some(v @ Value::Object(_)) => lenient::<SpreadsheetFilter>(v).unwrap_or_default(),
        _ => SpreadsheetFilter::default(),
    };
    if !filter.query.trim().is_empty() {
        return filter;
    }
    let query = string_field(obj, "query")
        .or_else(|| {
            obj.get("args")
                .and_then(Value::as_object)
                .and_then(|args| string_field(args, "query"))
        })
        .unwrap_or_default();
    SpreadsheetFilter {
        query: query.to_string(),
    }
}

fn text_payload(obj: &Map<String, Value>) -> ActionPayload {
    let text = string_field(obj, "text")
        .or_else(|| string_field(obj, "message"))
        .unwrap_or_default();
    ActionPayload::TextResponse {
        text: text.to_string(),
        await_user: obj.get("awaitUser").and_then(Value::as_bool).unwrap_or(false),
        quick_replies: obj
            .get("quickReplies")
            .and_then(lenient::<Vec<String>>)
            .unwrap_or_default(),
    }
}

fn lenient<T: DeserializeOwned>(value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Discarding undecodable payload: {}", e);
            None
        }
    }
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn step_id_field(obj: &Map<String, Value>) -> String {
    match obj.get("stepId") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
