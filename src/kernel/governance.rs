use serde::{Deserialize, Serialize};
use tracing::info;

use super::candidate::Candidate;
use crate::action::ActionKind;
use crate::catalog::{LatencyClass, Playbook, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    Risk(RiskLevel),
    Latency(LatencyClass),
}

#[derive(Debug, Clone, Default)]
pub struct GovernanceOutcome {
    pub kept: Vec<Candidate>,
    pub dropped: Vec<(ActionKind, DenyReason)>,
}

/// Drops candidates at or above any denied risk or latency threshold.
/// No playbook, or a playbook without a deny rule, passes everything through.
pub fn apply(candidates: Vec<Candidate>, playbook: Option<&Playbook>) -> GovernanceOutcome {
    let Some(rule) = playbook.and_then(Playbook::deny_rule) else {
        return GovernanceOutcome {
            kept: candidates,
            dropped: Vec::new(),
        };
    };

    let mut outcome = GovernanceOutcome::default();
    for candidate in candidates {
        let denied = rule
            .risk
            .iter()
            .find(|level| candidate.risk >= level.weight())
            .map(|level| DenyReason::Risk(*level))
            .or_else(|| {
                rule.latency_class
                    .iter()
                    .find(|class| candidate.latency >= class.weight())
                    .map(|class| DenyReason::Latency(*class))
            });

        match denied {
            Some(reason) => {
                info!(kind = %candidate.kind(), ?reason, "Governance dropped candidate");
                outcome.dropped.push((candidate.kind(), reason));
            }
            None => outcome.kept.push(candidate),
        }
    }
    outcome
}
