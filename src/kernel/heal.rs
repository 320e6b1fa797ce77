//! Final repair pass.
//!
//! Runs once on the finalized list and guarantees the structural invariants
//! regardless of model output quality: plan first, step ids and state tags on
//! every action, non-empty plan steps, resolvable DOM targets. The report is
//! diagnostics only and never feeds back into control flow. Healing its own
//! output a second time is a no-op (`mutated == false`).

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::arbitrator::{AUTO_INIT_GOAL, AUTO_INIT_REASON};
use super::config::EngineConfig;
use super::context::EngineContext;
use super::state_tag::StateTagFactory;
use crate::action::{coerce, Action, ActionPayload, DomAction};
use crate::plan::{PlanState, PlanStep, MIN_STEP_LEN};

const SCAFFOLD_STEP_LABEL: &str = "Respond to the current request";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealReport {
    pub mutated: bool,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl HealReport {
    pub fn note(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        debug!("heal: {}", msg);
        self.mutated = true;
        self.notes.push(msg);
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("heal: {}", msg);
        self.mutated = true;
        self.warnings.push(msg);
    }
}

/// Type coercion: turns raw model values into typed actions, noting every
/// kind that had to be inferred from the payload. Blank text responses carry
/// nothing for the user and are dropped.
pub fn coerce_all(values: Vec<Value>, report: &mut HealReport) -> Vec<Action> {
    let mut actions = Vec::with_capacity(values.len());
    for (idx, value) in values.into_iter().enumerate() {
        let coerced = coerce(value);
        if coerced.action.is_blank() {
            report.note(format!("action[{}]: dropped blank text_response", idx));
            continue;
        }
        if let Some(kind) = coerced.inferred {
            report.note(format!("action[{}]: kind inferred as {}", idx, kind));
        }
        actions.push(coerced.action);
    }
    actions
}

pub struct AutoHealer<'a> {
    ctx: &'a EngineContext,
    config: &'a EngineConfig,
    tags: &'a mut StateTagFactory,
    downgrades: usize,
}

impl<'a> AutoHealer<'a> {
    pub fn new(ctx: &'a EngineContext, config: &'a EngineConfig, tags: &'a mut StateTagFactory) -> Self {
        Self {
            ctx,
            config,
            tags,
            downgrades: 0,
        }
    }

    /// DOM actions downgraded to text during this healer's lifetime.
    pub fn downgrades(&self) -> usize {
        self.downgrades
    }

    pub fn heal(&mut self, actions: Vec<Action>, report: &mut HealReport) -> Vec<Action> {
        let mut actions = self.ensure_plan(actions, report);
        self.order_and_cap(&mut actions, report);

        let current = match actions.first_mut().filter(|a| a.is_plan()) {
            Some(plan) => self.normalize_plan(plan, report),
            None => self.config.current_step_id(self.ctx),
        };

        for (idx, action) in actions.iter_mut().enumerate() {
            if !action.is_plan() {
                backfill_step_id(idx, action, &current, report);
            }
            self.backfill_state_tag(idx, action, report);
            self.repair_dom_target(idx, action, report);
        }
        actions
    }

    fn ensure_plan(&self, mut actions: Vec<Action>, report: &mut HealReport) -> Vec<Action> {
        if self.ctx.plan_state.is_none() && !actions.iter().any(Action::is_plan) {
            actions.insert(0, Action::plan(PlanState::with_goal(AUTO_INIT_GOAL)).with_reason(AUTO_INIT_REASON));
            report.note("no plan in context or output; inserted scaffold plan");
        }
        actions
    }

    fn order_and_cap(&self, actions: &mut Vec<Action>, report: &mut HealReport) {
        if let Some(idx) = actions.iter().position(Action::is_plan).filter(|idx| *idx > 0) {
            let plan = actions.remove(idx);
            actions.insert(0, plan);
            report.note(format!("moved plan_state_update from index {} to 0", idx));
        }

        let before = actions.len();
        let mut seen_plan = false;
        actions.retain(|a| !a.is_plan() || !std::mem::replace(&mut seen_plan, true));
        if actions.len() < before {
            report.warn(format!("dropped {} duplicate plan_state_update action(s)", before - actions.len()));
        }

        let cap = self.config.cap(self.ctx);
        if actions.len() > cap {
            report.warn(format!("truncated {} actions to cap of {}", actions.len(), cap));
            actions.truncate(cap);
        }
    }

    /// Fills the plan payload and returns the step id non-plan actions
    /// should inherit.
    fn normalize_plan(&mut self, action: &mut Action, report: &mut HealReport) -> String {
        let ctx = self.ctx;
        let fallback = self.config.current_step_id(ctx);
        let scaffold_id = rekey_step_id(&fallback, 0);

        let (current, plan_tag) = {
            let Some(plan) = action.plan_state_mut() else {
                return fallback;
            };

            if plan.plan_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                let id = ctx
                    .plan_state
                    .as_ref()
                    .and_then(|p| p.plan_id.clone())
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| format!("plan-{}", ctx.run_id));
                plan.plan_id = Some(id);
                report.note("plan: filled planId");
            }

            if plan.goal.trim().is_empty() {
                plan.goal = ctx
                    .plan_state
                    .as_ref()
                    .map(|p| p.goal.trim())
                    .filter(|g| !g.is_empty())
                    .unwrap_or(AUTO_INIT_GOAL)
                    .to_string();
                report.note("plan: filled goal");
            }

            for (name, steps) in [("steps", &mut plan.steps), ("nextSteps", &mut plan.next_steps)] {
                for (pos, step) in steps.iter_mut().enumerate() {
                    if !step.has_valid_id() {
                        let id = rekey_step_id(&step.id, pos);
                        report.warn(format!("plan: re-keyed {} id '{}' as {}", name, step.id, id));
                        step.id = id;
                    }
                    if !step.has_valid_label() {
                        step.label = step.id.clone();
                        report.note(format!("plan: labelled step {}", step.id));
                    }
                }
            }
            if let Some(short) = plan
                .current_step()
                .filter(|id| id.chars().count() < MIN_STEP_LEN)
                .map(str::to_string)
            {
                let id = rekey_step_id(&short, 0);
                report.note(format!("plan: re-keyed currentStepId '{}' as {}", short, id));
                plan.current_step_id = Some(id);
            }

            if plan.next_steps.is_empty() {
                let next = plan
                    .steps
                    .iter()
                    .find(|s| s.is_open())
                    .cloned()
                    .unwrap_or_else(|| {
                        let id = plan.current_step().unwrap_or(scaffold_id.as_str()).to_string();
                        PlanStep::new(id, SCAFFOLD_STEP_LABEL)
                    });
                plan.next_steps.push(next);
                report.note("plan: defaulted nextSteps");
            }
            if plan.steps.is_empty() {
                plan.steps = plan.next_steps.clone();
                report.note("plan: defaulted steps");
            }
            if plan.current_step().map_or(true, |id| plan.find_step(id).is_none()) {
                plan.current_step_id = plan.next_steps.first().map(|s| s.id.clone());
                report.note("plan: pointed currentStepId at the next step");
            }

            if !plan.confidence.is_finite() {
                plan.confidence = 0.5;
                report.note("plan: reset non-finite confidence");
            } else if !(0.0..=1.0).contains(&plan.confidence) {
                plan.confidence = plan.confidence.clamp(0.0, 1.0);
                report.note("plan: clamped confidence");
            }

            if plan.updated_at.is_none() {
                plan.updated_at = Some(ctx.now);
                report.note("plan: stamped updatedAt");
            }
            if plan.state_tag.as_deref().map_or(true, |t| t.trim().is_empty()) {
                plan.state_tag = Some(self.tags.mint(ctx.now, Some("plan_state_update")));
                report.note("plan: minted stateTag");
            }

            let current = plan.current_step().map(str::to_string).unwrap_or(fallback);
            (current, plan.state_tag.clone())
        };

        backfill_step_id(0, action, &current, report);
        if action.state_tag.is_none() {
            action.state_tag = plan_tag;
            report.note("action[0]: copied plan stateTag");
        }
        current
    }

    fn backfill_state_tag(&mut self, idx: usize, action: &mut Action, report: &mut HealReport) {
        if action.state_tag.as_deref().map_or(true, |t| t.trim().is_empty()) {
            action.state_tag = Some(self.tags.mint(self.ctx.now, Some(action.kind().as_str())));
            report.note(format!("action[{}]: minted stateTag", idx));
        }
    }

    /// Promotes `cardId`/`cardTitle` arguments into an empty target; if the
    /// target is still unresolved the action becomes a text response.
    fn repair_dom_target(&mut self, idx: usize, action: &mut Action, report: &mut HealReport) {
        let ActionPayload::DomAction { dom } = &mut action.payload else {
            return;
        };
        if dom.target.is_resolved() {
            return;
        }

        if promote_card_reference(dom) {
            report.note(format!("action[{}]: promoted card reference into dom target", idx));
            return;
        }

        let tool = dom.tool_name.clone();
        action.payload = ActionPayload::text(self.config.dom_downgrade_text(&tool));
        self.downgrades += 1;
        report.note(format!("action[{}]: dom_action downgraded to text_response", idx));
        report.warn(format!("action[{}]: unresolvable dom target for tool '{}'", idx, tool));
    }
}

fn backfill_step_id(idx: usize, action: &mut Action, current: &str, report: &mut HealReport) {
    let step = action.step_id.trim();
    if step.chars().count() < MIN_STEP_LEN && step != current {
        action.step_id = current.to_string();
        report.note(format!("action[{}]: backfilled stepId", idx));
    }
}

/// Ids under the minimum length are prefixed rather than dropped, so plans
/// from stores with short ids keep their steps. Blank ids become positional.
fn rekey_step_id(id: &str, position: usize) -> String {
    let id = id.trim();
    if id.chars().count() >= MIN_STEP_LEN {
        id.to_string()
    } else if id.is_empty() {
        format!("step_{}", position + 1)
    } else {
        format!("step_{}", id)
    }
}

fn promote_card_reference(dom: &mut DomAction) -> bool {
    let arg = |key: &str| match dom.args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let by_id = arg("cardId");
    let by_title = arg("cardTitle");

    if by_id.is_none() && by_title.is_none() {
        return false;
    }
    dom.target.by_id = dom.target.by_id.take().filter(|s| !s.trim().is_empty()).or(by_id);
    dom.target.by_title = dom.target.by_title.take().filter(|s| !s.trim().is_empty()).or(by_title);
    dom.target.is_resolved()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_ids_are_prefixed() {
        assert_eq!(rekey_step_id("s1", 0), "step_s1");
        assert_eq!(rekey_step_id("  ", 2), "step_3");
        assert_eq!(rekey_step_id("load_data", 0), "load_data");
    }

    #[test]
    fn numeric_card_id_is_promoted() {
        let mut dom = DomAction::default();
        dom.args.insert("cardId".to_string(), json!(42));
        assert!(promote_card_reference(&mut dom));
        assert_eq!(dom.target.by_id.as_deref(), Some("42"));
    }

    #[test]
    fn blank_card_args_are_ignored() {
        let mut dom = DomAction::default();
        dom.args.insert("cardTitle".to_string(), json!("   "));
        assert!(!promote_card_reference(&mut dom));
    }

    #[test]
    fn short_step_equal_to_current_is_kept() {
        let mut report = HealReport::default();
        let mut action = Action::text("s1", "ok");
        backfill_step_id(0, &mut action, "s1", &mut report);
        assert!(!report.mutated);

        let mut action = Action::text(" ", "ok");
        backfill_step_id(0, &mut action, "s1", &mut report);
        assert_eq!(action.step_id, "s1");
        assert!(report.mutated);
    }
}
