//! Arbitration telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (deriver, governance, arbiter or heal).
//!
//! # PRIVACY INVARIANT
//! Events carry action kinds, sources and counts only. Never user text,
//! model text, code or plan content.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::TelemetryEvent;
pub use metrics::TelemetrySnapshot;
pub use recorder::TelemetryRecorder;
