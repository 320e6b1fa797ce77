use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::arbitrator::ActionArbitrator;
use super::candidate::derive_all;
use super::config::EngineConfig;
use super::context::{ContextError, EngineContext};
use super::enforcement::enforce;
use super::governance;
use super::heal::{coerce_all, AutoHealer, HealReport};
use super::state_tag::StateTagFactory;
use super::telemetry::{TelemetryEvent, TelemetryRecorder};
use crate::action::Action;
use crate::catalog::{PlaybookCatalog, ToolCatalog};

/// Model response as produced by the LLM client. Only `actions` is touched;
/// every other field passes through unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentResponse {
    pub fn from_actions(actions: Vec<Value>) -> Self {
        Self {
            actions,
            extra: Map::new(),
        }
    }
}

/// Same shape as [`AgentResponse`] with `actions` replaced by the healed list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitratedResponse {
    pub actions: Vec<Action>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineOutput {
    pub response: ArbitratedResponse,
    pub report: HealReport,
}

impl EngineOutput {
    pub fn actions(&self) -> &[Action] {
        &self.response.actions
    }
}

/// One engine per conversation session. The catalogs are shared; the state
/// tag counter is owned and is the only mutable resource.
pub struct ArbitrationEngine {
    tools: Arc<ToolCatalog>,
    playbooks: Arc<PlaybookCatalog>,
    config: EngineConfig,
    arbitrator: ActionArbitrator,
    tags: StateTagFactory,
    pub telemetry: TelemetryRecorder,
}

impl ArbitrationEngine {
    pub fn new(tools: Arc<ToolCatalog>, playbooks: Arc<PlaybookCatalog>, config: EngineConfig) -> Self {
        if tools.is_empty() {
            warn!("Tool catalog is empty; every candidate is scored with default weights");
        }
        if playbooks.is_empty() {
            warn!("Playbook catalog is empty; no governance rules or canned replies");
        }
        debug!(tools = tools.len(), playbooks = playbooks.len(), "Arbitration engine ready");
        Self {
            tools,
            playbooks,
            config,
            arbitrator: ActionArbitrator::new(),
            tags: StateTagFactory::new(),
            telemetry: TelemetryRecorder::new(),
        }
    }

    pub fn with_builtin_catalogs(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(ToolCatalog::builtin()),
            Arc::new(PlaybookCatalog::builtin()),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Raw actions + context -> healed, arbitrated action list.
    ///
    /// Only a contractually invalid context is reported as an error; model
    /// output of any shape yields a non-empty list.
    pub fn process(&mut self, response: AgentResponse, ctx: &EngineContext) -> Result<EngineOutput, ContextError> {
        ctx.validate()?;
        let AgentResponse { actions: raw, extra } = response;
        debug!(run_id = %ctx.run_id, raw = raw.len(), "Arbitrating turn");

        let mut report = HealReport::default();
        let proposed = coerce_all(raw, &mut report);
        let playbook = ctx.intent().and_then(|i| self.playbooks.find(i));

        // 1. Derive + govern
        let candidates = derive_all(proposed.clone(), ctx, &self.tools);
        self.telemetry.record(TelemetryEvent::CandidatesDerived {
            count: candidates.len(),
        });
        let governed = governance::apply(candidates, playbook);
        for (kind, reason) in &governed.dropped {
            self.telemetry.record(TelemetryEvent::GovernanceDrop {
                kind: *kind,
                reason: *reason,
            });
        }

        // 2. Arbitrate
        let selection = self.arbitrator.select(governed.kept, ctx);
        self.telemetry.record(TelemetryEvent::ArbiterSelection {
            plan: selection.plan_source,
            operational: selection.operational,
        });
        let mut actions = selection.actions;

        // 3. Conversational override
        if let Some(forced) = enforce(ctx, &proposed, playbook, &self.config) {
            self.telemetry.record(TelemetryEvent::IntentOverride {
                reply_source: forced.reply_source,
            });
            actions = forced.actions;
        }

        // 4. Never empty
        if actions.is_empty() {
            info!(run_id = %ctx.run_id, "Nothing survived arbitration; injecting fallback reply");
            self.telemetry.record(TelemetryEvent::FallbackInjected);
            actions.push(Action::text(
                self.config.current_step_id(ctx),
                self.config.fallback_message.clone(),
            ));
        }

        // 5. Heal
        let (actions, downgrades) = {
            let mut healer = AutoHealer::new(ctx, &self.config, &mut self.tags);
            let healed = healer.heal(actions, &mut report);
            (healed, healer.downgrades())
        };
        if downgrades > 0 {
            self.telemetry.record(TelemetryEvent::DomDowngrade { count: downgrades });
        }
        self.telemetry.record(TelemetryEvent::HealCompleted {
            mutated: report.mutated,
            notes: report.notes.len(),
            warnings: report.warnings.len(),
        });

        info!(
            run_id = %ctx.run_id,
            kinds = ?actions.iter().map(Action::kind).collect::<Vec<_>>(),
            mutated = report.mutated,
            "Turn arbitrated"
        );

        Ok(EngineOutput {
            response: ArbitratedResponse { actions, extra },
            report,
        })
    }

    /// Runs only the heal pass over an already typed list. Used to re-check
    /// stored output and by the idempotency tests.
    pub fn heal(&mut self, actions: Vec<Action>, ctx: &EngineContext) -> (Vec<Action>, HealReport) {
        let mut report = HealReport::default();
        let mut healer = AutoHealer::new(ctx, &self.config, &mut self.tags);
        let healed = healer.heal(actions, &mut report);
        (healed, report)
    }

    pub fn tags_minted(&self) -> u64 {
        self.tags.minted()
    }
}

impl Default for ArbitrationEngine {
    fn default() -> Self {
        Self::with_builtin_catalogs(EngineConfig::default())
    }
}
