//! Static, read-only tables shared by every engine instance.

pub mod playbooks;
pub mod template;
pub mod tools;

pub use playbooks::{DenyRule, Governance, Playbook, PlaybookCatalog, QuickActionRule};
pub use template::{render, TemplateToken, TemplateVars};
pub use tools::{LatencyClass, RiskLevel, ToolCatalog, ToolProfile};
