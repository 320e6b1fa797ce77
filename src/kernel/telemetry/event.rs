use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::kernel::candidate::CandidateSource;
use crate::kernel::governance::DenyReason;

// Allowed: kinds, sources, counts, flags
// Forbidden: user message text, model text, code, plan goals

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    CandidatesDerived {
        count: usize,
    },

    GovernanceDrop {
        kind: ActionKind,
        reason: DenyReason,
    },

    ArbiterSelection {
        plan: Option<CandidateSource>,
        operational: Option<ActionKind>,
    },

    IntentOverride {
        reply_source: CandidateSource,
    },

    FallbackInjected,

    DomDowngrade {
        count: usize,
    },

    HealCompleted {
        mutated: bool,
        notes: usize,
        warnings: usize,
    },
}
