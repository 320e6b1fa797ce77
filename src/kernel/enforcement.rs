//! Deterministic two-action reply for purely conversational intents.
//!
//! Model output is least reliable on low-stakes turns like greetings, and a
//! wrong action there is highly visible. For these intents the arbiter's
//! choice is discarded in favour of `[plan_state_update, text_response]`.

use tracing::info;

use super::candidate::CandidateSource;
use super::config::EngineConfig;
use super::context::EngineContext;
use crate::action::{Action, ActionPayload};
use crate::catalog::{Playbook, TemplateVars};
use crate::plan::{PlanState, PlanStep};

pub const CONVERSATIONAL_INTENTS: [&str; 3] = ["greeting", "smalltalk", "ask_user_choice"];
pub const GREETING_GOAL: &str = "acknowledge the user and gather their request";
pub const GREETING_STEP_ID: &str = "acknowledge_user_greeting";
const GREETING_STEP_LABEL: &str = "Acknowledge the user and ask what they need";

#[derive(Debug, Clone)]
pub struct Enforced {
    pub actions: Vec<Action>,
    /// Where the reply text came from: the model, the playbook, or the
    /// hard-coded greeting.
    pub reply_source: CandidateSource,
}

pub fn is_conversational(intent: &str) -> bool {
    CONVERSATIONAL_INTENTS.contains(&intent)
}

/// Returns the forced reply, or `None` when the override does not apply.
/// `proposed` is the full coerced model output, before governance.
pub fn enforce(
    ctx: &EngineContext,
    proposed: &[Action],
    playbook: Option<&Playbook>,
    config: &EngineConfig,
) -> Option<Enforced> {
    if ctx.is_plan_only() {
        return None;
    }
    let intent = ctx.intent().filter(|i| is_conversational(i))?;

    let mut plan = proposed
        .iter()
        .find(|a| a.is_plan())
        .cloned()
        .unwrap_or_else(|| {
            Action::plan(PlanState::scaffold(
                GREETING_GOAL,
                PlanStep::new(GREETING_STEP_ID, GREETING_STEP_LABEL),
            ))
        });
    let step_id = plan
        .plan_state()
        .and_then(PlanState::current_step)
        .unwrap_or(GREETING_STEP_ID)
        .to_string();
    if plan.step_id.trim().is_empty() {
        plan.step_id = step_id.clone();
    }

    let model_reply = proposed
        .iter()
        .find(|a| a.response_text().is_some_and(|t| !t.trim().is_empty()));
    let (reply, reply_source) = match model_reply {
        Some(model_reply) => (sanitize(model_reply.clone()), CandidateSource::Model),
        None => match playbook {
            Some(pb) => (playbook_reply(pb, ctx, plan.plan_state()), CandidateSource::Playbook),
            None => (
                Action::new(ActionPayload::text(config.greeting_message.clone())),
                CandidateSource::Middleware,
            ),
        },
    };
    let reply = if reply.step_id.trim().is_empty() {
        reply.with_step(step_id)
    } else {
        reply
    };

    info!(intent, ?reply_source, "Conversational intent override applied");
    Some(Enforced {
        actions: vec![plan, reply],
        reply_source,
    })
}

/// Clears any "await user" side flag from a model-authored reply.
fn sanitize(mut action: Action) -> Action {
    if let ActionPayload::TextResponse { await_user, .. } = &mut action.payload {
        *await_user = false;
    }
    action
}

fn playbook_reply(playbook: &Playbook, ctx: &EngineContext, plan: Option<&PlanState>) -> Action {
    let intent = ctx.detected_intent.as_ref();
    let current_step = plan
        .and_then(|p| p.current_step().and_then(|id| p.find_step(id)))
        .map(|s| s.label.clone())
        .unwrap_or_default();
    let vars = TemplateVars {
        user_message: ctx.user_message.clone(),
        goal: plan.map(|p| p.goal.clone()).unwrap_or_default(),
        current_step,
        intent: ctx.intent().unwrap_or_default().to_string(),
        choices: intent
            .and_then(|i| i.choices())
            .unwrap_or_else(|| "the suggested analyses".to_string()),
    };

    Action::new(ActionPayload::TextResponse {
        text: playbook.render(&vars),
        await_user: false,
        quick_replies: playbook.quick_replies(|hint| intent.is_some_and(|i| i.has_hint(hint))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::catalog::PlaybookCatalog;
    use crate::kernel::context::{DetectedIntent, PromptMode};
    use chrono::Utc;

    fn ctx(intent: &str) -> EngineContext {
        EngineContext::new("r1", Utc::now()).with_intent(DetectedIntent::new(intent))
    }

    #[test]
    fn non_conversational_intent_is_untouched() {
        let config = EngineConfig::default();
        assert!(enforce(&ctx("data_filter"), &[], None, &config).is_none());
    }

    #[test]
    fn plan_only_disables_override() {
        let config = EngineConfig::default();
        let ctx = ctx("greeting").with_mode(PromptMode::PlanOnly);
        assert!(enforce(&ctx, &[], None, &config).is_none());
    }

    #[test]
    fn greeting_without_model_output_uses_playbook() {
        let config = EngineConfig::default();
        let catalog = PlaybookCatalog::builtin();
        let forced = enforce(&ctx("greeting"), &[], catalog.find("greeting"), &config).unwrap();

        assert_eq!(forced.reply_source, CandidateSource::Playbook);
        let kinds: Vec<_> = forced.actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, vec![ActionKind::PlanStateUpdate, ActionKind::TextResponse]);
        assert_eq!(forced.actions[0].plan_state().unwrap().goal, GREETING_GOAL);
        assert_eq!(forced.actions[1].step_id, GREETING_STEP_ID);
        assert!(matches!(
            &forced.actions[1].payload,
            ActionPayload::TextResponse { quick_replies, .. } if quick_replies.len() == 2
        ));
    }

    #[test]
    fn model_reply_is_kept_but_sanitized() {
        let config = EngineConfig::default();
        let reply = Action::new(ActionPayload::TextResponse {
            text: "Hey! What are we analyzing today?".to_string(),
            await_user: true,
            quick_replies: Vec::new(),
        });
        let forced = enforce(&ctx("smalltalk"), &[reply], None, &config).unwrap();

        assert_eq!(forced.reply_source, CandidateSource::Model);
        assert!(matches!(
            &forced.actions[1].payload,
            ActionPayload::TextResponse { await_user: false, text, .. } if text.starts_with("Hey!")
        ));
    }

    #[test]
    fn blank_model_reply_is_not_used() {
        let config = EngineConfig::default();
        let catalog = PlaybookCatalog::builtin();
        let blank = Action::new(ActionPayload::text("   "));
        let forced = enforce(&ctx("greeting"), &[blank], catalog.find("greeting"), &config).unwrap();

        assert_eq!(forced.reply_source, CandidateSource::Playbook);
        assert!(!forced.actions[1].response_text().unwrap().trim().is_empty());
    }

    #[test]
    fn no_playbook_falls_back_to_configured_greeting() {
        let config = EngineConfig::default();
        let forced = enforce(&ctx("greeting"), &[], None, &config).unwrap();
        assert_eq!(forced.reply_source, CandidateSource::Middleware);
        assert_eq!(forced.actions[1].response_text(), Some(config.greeting_message.as_str()));
    }

    #[test]
    fn choices_hint_renders_into_template() {
        let config = EngineConfig::default();
        let catalog = PlaybookCatalog::builtin();
        let mut intent = DetectedIntent::new("ask_user_choice");
        intent.hints.insert("choices".to_string(), serde_json::json!(["bar chart", "pivot table"]));
        let ctx = EngineContext::new("r1", Utc::now()).with_intent(intent);

        let forced = enforce(&ctx, &[], catalog.find("ask_user_choice"), &config).unwrap();
        let text = forced.actions[1].response_text().unwrap();
        assert!(text.contains("bar chart, pivot table"));
    }
}
