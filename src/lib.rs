pub mod action;
pub mod catalog;
pub mod kernel;
pub mod plan;

pub use kernel::config::EngineConfig;
pub use kernel::context::{ContextError, DetectedIntent, EngineContext, PromptMode};
pub use kernel::engine::{AgentResponse, ArbitratedResponse, ArbitrationEngine, EngineOutput};
pub use kernel::heal::HealReport;
