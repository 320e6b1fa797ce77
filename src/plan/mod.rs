pub mod types;

pub use types::{PlanState, PlanStep, StepId, StepStatus, MIN_STEP_LEN};
