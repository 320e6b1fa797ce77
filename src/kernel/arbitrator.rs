use std::cmp::Ordering;
use tracing::{debug, info};

use super::candidate::{Candidate, CandidateSource};
use super::context::EngineContext;
use crate::action::{Action, ActionKind};
use crate::plan::PlanState;

pub const AUTO_INIT_REASON: &str = "model skipped plan tracking";
pub const AUTO_INIT_GOAL: &str = "Respond to the user's latest request";

#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Ordered `[plan, operational]`, absent slots omitted.
    pub actions: Vec<Action>,
    pub plan_source: Option<CandidateSource>,
    pub operational: Option<ActionKind>,
}

/// Picks at most one plan-tracking action and at most one operational action.
pub struct ActionArbitrator;

impl ActionArbitrator {
    pub fn new() -> Self {
        Self
    }

    pub fn select(&self, mut candidates: Vec<Candidate>, ctx: &EngineContext) -> Selection {
        for c in candidates.iter_mut() {
            c.score = c.compute_score();
        }
        // Stable: ties keep the model's order.
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let (plans, operational): (Vec<Candidate>, Vec<Candidate>) =
            candidates.into_iter().partition(|c| c.kind().is_plan());

        let mut selection = Selection::default();

        let plan = plans
            .into_iter()
            .next()
            .or_else(|| self.auto_init(ctx));
        if let Some(plan) = plan {
            debug!(source = ?plan.source, score = plan.score, "Plan slot filled");
            selection.plan_source = Some(plan.source);
            selection.actions.push(plan.action);
        }

        if ctx.is_plan_only() {
            selection.actions.truncate(1);
            return selection;
        }

        if let Some(op) = operational.into_iter().next() {
            debug!(kind = %op.kind(), score = op.score, "Operational slot filled");
            selection.operational = Some(op.kind());
            selection.actions.push(op.action);
        }

        selection.actions.truncate(2);
        selection
    }

    /// Plan candidate synthesized when the model proposed none. Skipped once
    /// the plan budget is exhausted.
    fn auto_init(&self, ctx: &EngineContext) -> Option<Candidate> {
        if ctx.plan_budget_exhausted {
            info!("Plan budget exhausted; not synthesizing a plan");
            return None;
        }

        let plan = match &ctx.plan_state {
            Some(existing) => PlanState {
                state_tag: None,
                updated_at: None,
                ..existing.clone()
            },
            None => PlanState::with_goal(AUTO_INIT_GOAL),
        };

        Some(Candidate {
            action: Action::plan(plan).with_reason(AUTO_INIT_REASON),
            source: CandidateSource::Middleware,
            utility: 0.0,
            confidence: 0.0,
            cost: 0.0,
            risk: 0.0,
            latency: 0.0,
            score: 0.0,
        })
    }
}

impl Default for ActionArbitrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionPayload, SpreadsheetFilter};
    use crate::catalog::ToolCatalog;
    use crate::kernel::candidate::derive_all;
    use crate::kernel::context::PromptMode;
    use chrono::Utc;

    fn filter() -> Action {
        Action::new(ActionPayload::FilterSpreadsheet {
            filter: SpreadsheetFilter {
                query: "region = 'EMEA'".to_string(),
            },
        })
    }

    #[test]
    fn synthesizes_plan_when_model_skipped_it() {
        let ctx = EngineContext::new("r1", Utc::now());
        let candidates = derive_all(vec![filter()], &ctx, &ToolCatalog::builtin());
        let selection = ActionArbitrator::new().select(candidates, &ctx);

        assert_eq!(selection.plan_source, Some(CandidateSource::Middleware));
        assert_eq!(selection.actions.len(), 2);
        assert_eq!(selection.actions[0].kind(), ActionKind::PlanStateUpdate);
        assert_eq!(selection.actions[0].reason.as_deref(), Some(AUTO_INIT_REASON));
        assert_eq!(selection.actions[1].kind(), ActionKind::FilterSpreadsheet);
    }

    #[test]
    fn model_plan_is_placed_first() {
        let ctx = EngineContext::new("r1", Utc::now());
        let actions = vec![filter(), Action::plan(PlanState::with_goal("Filter EMEA"))];
        let candidates = derive_all(actions, &ctx, &ToolCatalog::builtin());
        let selection = ActionArbitrator::new().select(candidates, &ctx);

        assert_eq!(selection.plan_source, Some(CandidateSource::Model));
        assert_eq!(selection.actions[0].kind(), ActionKind::PlanStateUpdate);
        assert_eq!(selection.actions[1].kind(), ActionKind::FilterSpreadsheet);
    }

    #[test]
    fn highest_scoring_operational_wins() {
        let ctx = EngineContext::new("r1", Utc::now());
        let actions = vec![
            filter(),
            Action::text("abc", "Here you go").with_reason("x".repeat(100)),
        ];
        let candidates = derive_all(actions, &ctx, &ToolCatalog::builtin());
        let selection = ActionArbitrator::new().select(candidates, &ctx);
        assert_eq!(selection.operational, Some(ActionKind::TextResponse));
    }

    #[test]
    fn plan_only_returns_single_plan() {
        let ctx = EngineContext::new("r1", Utc::now()).with_mode(PromptMode::PlanOnly);
        let candidates = derive_all(vec![filter()], &ctx, &ToolCatalog::builtin());
        let selection = ActionArbitrator::new().select(candidates, &ctx);
        assert_eq!(selection.actions.len(), 1);
        assert!(selection.actions[0].is_plan());
        assert!(selection.operational.is_none());
    }

    #[test]
    fn exhausted_budget_leaves_plan_slot_empty() {
        let ctx = EngineContext::new("r1", Utc::now())
            .with_mode(PromptMode::PlanOnly)
            .with_budget_exhausted(true);
        let candidates = derive_all(vec![filter()], &ctx, &ToolCatalog::builtin());
        let selection = ActionArbitrator::new().select(candidates, &ctx);
        assert!(selection.actions.is_empty());
    }
}
