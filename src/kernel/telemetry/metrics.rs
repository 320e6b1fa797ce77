use std::collections::VecDeque;

use super::event::TelemetryEvent;
use crate::kernel::candidate::CandidateSource;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub turn_stats: TurnStats,
    pub selection_stats: SelectionStats,
    pub heal_stats: HealStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnStats {
    pub turns: u64,
    pub total_candidates: u64,
    pub avg_candidates_per_turn: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionStats {
    pub governance_drops: u64,
    pub model_plans: u64,
    pub auto_init_plans: u64,
    pub operational_picks: u64,
    pub intent_overrides: u64,
    pub fallbacks: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealStats {
    pub mutated_turns: u64,
    pub notes: u64,
    pub warnings: u64,
    pub dom_downgrades: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    let mut derivations = 0u64;

    for event in events {
        match event {
            TelemetryEvent::CandidatesDerived { count } => {
                snap.turn_stats.total_candidates += *count as u64;
                derivations += 1;
            }
            TelemetryEvent::GovernanceDrop { .. } => snap.selection_stats.governance_drops += 1,
            TelemetryEvent::ArbiterSelection { plan, operational } => {
                match plan {
                    Some(CandidateSource::Middleware) => snap.selection_stats.auto_init_plans += 1,
                    Some(_) => snap.selection_stats.model_plans += 1,
                    None => {}
                }
                if operational.is_some() {
                    snap.selection_stats.operational_picks += 1;
                }
            }
            TelemetryEvent::IntentOverride { .. } => snap.selection_stats.intent_overrides += 1,
            TelemetryEvent::FallbackInjected => snap.selection_stats.fallbacks += 1,
            TelemetryEvent::DomDowngrade { count } => snap.heal_stats.dom_downgrades += *count as u64,
            TelemetryEvent::HealCompleted { mutated, notes, warnings } => {
                // One heal per turn.
                snap.turn_stats.turns += 1;
                if *mutated {
                    snap.heal_stats.mutated_turns += 1;
                }
                snap.heal_stats.notes += *notes as u64;
                snap.heal_stats.warnings += *warnings as u64;
            }
        }
    }

    if derivations > 0 {
        snap.turn_stats.avg_candidates_per_turn =
            snap.turn_stats.total_candidates as f64 / derivations as f64;
    }

    snap
}
