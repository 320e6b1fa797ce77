use arbiter::action::{Action, ActionKind};
use arbiter::catalog::{DenyRule, Governance, Playbook, PlaybookCatalog, RiskLevel, ToolCatalog};
use arbiter::kernel::arbitrator::{AUTO_INIT_GOAL, AUTO_INIT_REASON};
use arbiter::plan::{PlanState, PlanStep};
use arbiter::{
    AgentResponse, ArbitrationEngine, ContextError, DetectedIntent, EngineConfig, EngineContext,
    PromptMode,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn kinds(actions: &[Action]) -> Vec<ActionKind> {
    actions.iter().map(Action::kind).collect()
}

fn js_action() -> Value {
    json!({ "kind": "execute_js_code", "code": { "jsCode": "return rows.filter(r => r.total > 0);" } })
}

fn strict_transform_engine() -> ArbitrationEngine {
    let playbooks = PlaybookCatalog::from_playbooks(vec![Playbook {
        id: "no_risky_code".to_string(),
        intent: "data_transform".to_string(),
        success_criteria: Vec::new(),
        template: "Transforming as asked.".to_string(),
        quick_actions: Vec::new(),
        governance: Some(Governance {
            deny_tools_if: DenyRule {
                risk: vec![RiskLevel::High],
                latency_class: Vec::new(),
            },
        }),
    }]);
    ArbitrationEngine::new(
        Arc::new(ToolCatalog::builtin()),
        Arc::new(playbooks),
        EngineConfig::default(),
    )
}

fn review_plan() -> PlanState {
    PlanState::scaffold("Review totals", PlanStep::new("review_totals", "Review the totals"))
}

#[test]
fn test_transform_without_plan_gets_scaffold() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-42", now()).with_intent(DetectedIntent::new("data_transform"));

    let out = engine
        .process(AgentResponse::from_actions(vec![js_action()]), &ctx)
        .unwrap();
    let actions = out.actions();

    assert_eq!(kinds(actions), vec![ActionKind::PlanStateUpdate, ActionKind::ExecuteJsCode]);

    let plan = actions[0].plan_state().unwrap();
    assert_eq!(actions[0].step_id, "ad_hoc_response");
    assert_eq!(actions[0].reason.as_deref(), Some(AUTO_INIT_REASON));
    assert_eq!(plan.goal, AUTO_INIT_GOAL);
    assert_eq!(plan.plan_id.as_deref(), Some("plan-run-42"));
    assert_eq!(plan.current_step_id.as_deref(), Some("ad_hoc_response"));
    assert_eq!(plan.updated_at, Some(now()));
    assert_eq!(actions[0].state_tag, plan.state_tag);

    assert_eq!(actions[1].step_id, "ad_hoc_response", "stepId must be backfilled");
    let tags: HashSet<_> = actions.iter().map(|a| a.state_tag.clone().unwrap()).collect();
    assert_eq!(tags.len(), 2, "every action gets its own state tag");
    assert!(out.report.mutated);
}

#[test]
fn test_declared_code_kind_survives_non_canonical_payload() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-43", now()).with_intent(DetectedIntent::new("data_transform"));
    let response = AgentResponse::from_actions(vec![json!({
        "kind": "execute_js_code",
        "code": { "explanation": "sum the totals", "jsFunctionBody": "return data;" }
    })]);

    let out = engine.process(response, &ctx).unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate, ActionKind::ExecuteJsCode]);
    assert!(!out.report.notes.iter().any(|n| n.contains("inferred")));
}

#[test]
fn test_declared_filter_kind_survives_missing_filter_object() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-44", now()).with_intent(DetectedIntent::new("data_filter"));
    let response = AgentResponse::from_actions(vec![json!({
        "kind": "filter_spreadsheet",
        "args": { "query": "region = 'EMEA'" }
    })]);

    let out = engine.process(response, &ctx).unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate, ActionKind::FilterSpreadsheet]);
}

#[test]
fn test_blank_text_never_takes_the_operational_slot() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-45", now());
    let response = AgentResponse::from_actions(vec![
        json!({ "kind": "text_response", "text": "", "reason": "a long and detailed rationale for saying nothing" }),
        json!({ "foo": 1 }),
        json!({ "kind": "proceed_to_analysis" }),
    ]);

    let out = engine.process(response, &ctx).unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate, ActionKind::ProceedToAnalysis]);
}

#[test]
fn test_empty_model_output_is_never_empty() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-1", now());

    let out = engine.process(AgentResponse::default(), &ctx).unwrap();
    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate]);
}

#[test]
fn test_governance_excludes_high_risk_code() {
    let mut engine = strict_transform_engine();
    let ctx = EngineContext::new("run-1", now()).with_intent(DetectedIntent::new("data_transform"));

    let response = AgentResponse::from_actions(vec![
        js_action(),
        json!({ "kind": "text_response", "text": "I'll clean up the totals column." }),
    ]);
    let out = engine.process(response, &ctx).unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate, ActionKind::TextResponse]);
    assert!(!kinds(out.actions()).contains(&ActionKind::ExecuteJsCode));

    let only_code = engine
        .process(AgentResponse::from_actions(vec![js_action()]), &ctx)
        .unwrap();
    assert_eq!(kinds(only_code.actions()), vec![ActionKind::PlanStateUpdate]);
}

#[test]
fn test_total_exclusion_with_exhausted_budget_injects_fallback() {
    let mut engine = strict_transform_engine();
    let ctx = EngineContext::new("run-1", now())
        .with_intent(DetectedIntent::new("data_transform"))
        .with_plan(review_plan())
        .with_budget_exhausted(true);

    let out = engine
        .process(AgentResponse::from_actions(vec![js_action()]), &ctx)
        .unwrap();
    let actions = out.actions();

    assert_eq!(kinds(actions), vec![ActionKind::TextResponse]);
    assert_eq!(actions[0].response_text(), Some(engine.config().fallback_message.as_str()));
    assert_eq!(actions[0].step_id, "review_totals");
    assert!(actions[0].state_tag.is_some());
}

#[test]
fn test_fallback_without_context_plan_gains_scaffold_plan() {
    let mut engine = strict_transform_engine();
    let ctx = EngineContext::new("run-1", now())
        .with_intent(DetectedIntent::new("data_transform"))
        .with_budget_exhausted(true);

    let out = engine
        .process(AgentResponse::from_actions(vec![js_action()]), &ctx)
        .unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate, ActionKind::TextResponse]);
    assert!(out.report.notes.iter().any(|n| n.contains("inserted scaffold plan")));
}

#[test]
fn test_plan_only_returns_one_plan() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-1", now()).with_mode(PromptMode::PlanOnly);

    let response = AgentResponse::from_actions(vec![
        json!({ "kind": "text_response", "text": "Working on it" }),
        js_action(),
        json!({ "kind": "plan_state_update", "planState": { "goal": "Chart monthly revenue" } }),
    ]);
    let out = engine.process(response, &ctx).unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate]);
    assert_eq!(out.actions()[0].plan_state().unwrap().goal, "Chart monthly revenue");
}

#[test]
fn test_plan_only_fallback_respects_cap() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-1", now())
        .with_mode(PromptMode::PlanOnly)
        .with_budget_exhausted(true);

    let out = engine
        .process(AgentResponse::from_actions(vec![json!({ "kind": "text_response", "text": "hi" })]), &ctx)
        .unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate]);
    assert!(!out.report.warnings.is_empty());
}

#[test]
fn test_model_plan_after_operational_is_reordered() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-1", now()).with_intent(DetectedIntent::new("data_filter"));

    let response = AgentResponse::from_actions(vec![
        json!({ "kind": "filter_spreadsheet", "filter": { "query": "region = 'EMEA'" }, "stepId": "filter_emea" }),
        json!({
            "kind": "plan_state_update",
            "stepId": "filter_emea",
            "planState": {
                "goal": "Focus on EMEA",
                "nextSteps": [{ "id": "filter_emea", "label": "Filter to EMEA rows" }]
            }
        }),
    ]);
    let out = engine.process(response, &ctx).unwrap();

    assert_eq!(kinds(out.actions()), vec![ActionKind::PlanStateUpdate, ActionKind::FilterSpreadsheet]);
    assert_eq!(out.actions()[1].step_id, "filter_emea");
    let plan = out.actions()[0].plan_state().unwrap();
    assert_eq!(plan.current_step_id.as_deref(), Some("filter_emea"));
    assert_eq!(plan.steps.len(), 1);
}

#[test]
fn test_extra_response_fields_pass_through() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("run-1", now());
    let response: AgentResponse = serde_json::from_value(json!({
        "actions": [],
        "thoughts": "model scratchpad",
        "model": "local"
    }))
    .unwrap();

    let out = engine.process(response, &ctx).unwrap();
    let value = serde_json::to_value(&out.response).unwrap();
    assert_eq!(value["thoughts"], "model scratchpad");
    assert_eq!(value["actions"][0]["kind"], "plan_state_update");
}

#[test]
fn test_invalid_context_is_the_only_error() {
    let mut engine = ArbitrationEngine::default();
    let ctx = EngineContext::new("", now());
    let err = engine.process(AgentResponse::default(), &ctx).unwrap_err();
    assert!(matches!(err, ContextError::MissingRunId));
}

#[test]
fn test_structural_invariants_hold_for_noisy_inputs() {
    let raws: Vec<Vec<Value>> = vec![
        vec![],
        vec![json!(null), json!(5), json!("plain string")],
        vec![js_action(), json!({ "kind": "plan_state_update" })],
        vec![
            json!({ "kind": "plan_state_update", "planState": { "goal": "A" } }),
            json!({ "kind": "plan_state_update", "planState": { "goal": "B" } }),
            json!({ "kind": "text_response", "text": "two plans" }),
        ],
        vec![json!({ "kind": "dom_action", "domAction": { "toolName": "removeCard" } })],
        vec![json!({ "domAction": { "toolName": "removeCard", "args": { "cardId": 17 } } })],
        vec![json!({ "kind": "clarification_request", "question": "Which column?" }), json!({ "plan": {} })],
    ];
    let contexts = vec![
        EngineContext::new("run-1", now()),
        EngineContext::new("run-2", now()).with_intent(DetectedIntent::new("remove_card")),
        EngineContext::new("run-3", now()).with_intent(DetectedIntent::new("greeting")),
        EngineContext::new("run-4", now()).with_mode(PromptMode::PlanOnly),
        EngineContext::new("run-5", now()).with_plan(review_plan()).with_budget_exhausted(true),
        EngineContext::new("run-6", now())
            .with_mode(PromptMode::PlanOnly)
            .with_budget_exhausted(true),
    ];

    let mut engine = ArbitrationEngine::default();
    for ctx in &contexts {
        let cap = engine.config().cap(ctx);
        for raw in &raws {
            let out = engine
                .process(AgentResponse::from_actions(raw.clone()), ctx)
                .unwrap();
            let actions = out.actions();

            assert!(!actions.is_empty(), "empty output for {:?}", raw);
            assert!(actions.len() <= cap, "cap exceeded for {:?}", raw);
            if let Some(idx) = actions.iter().position(Action::is_plan) {
                assert_eq!(idx, 0, "plan must lead for {:?}", raw);
            }
            assert!(actions.iter().filter(|a| a.is_plan()).count() <= 1);
            for action in actions {
                assert!(!action.step_id.is_empty());
                assert!(action.state_tag.is_some());
                if let Some(plan) = action.plan_state() {
                    assert!(!plan.steps.is_empty());
                    assert!(!plan.next_steps.is_empty());
                }
            }

            let (_, report) = engine.heal(actions.to_vec(), ctx);
            assert!(!report.mutated, "second heal mutated {:?}: {:?}", raw, report);
        }
    }
}
