use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::{EngineContext, PromptMode};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("max_actions must be 1 or 2, got {0}")]
    MaxActions(usize),
    #[error("fallback_step_id must be at least 3 characters")]
    FallbackStepId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Step id used when neither the plan nor the pending queue names one.
    pub fallback_step_id: String,
    pub fallback_message: String,
    /// Greeting used when the model produced no text and no playbook matched.
    pub greeting_message: String,
    /// Text for a DOM action whose target cannot be resolved. `{{tool}}` is
    /// replaced with the tool name.
    pub dom_downgrade_message: String,
    pub max_actions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_step_id: "ad_hoc_response".to_string(),
            fallback_message: "I'm ready to help. Tell me what you'd like to explore in your data."
                .to_string(),
            greeting_message: "Hello! Upload a CSV or ask me about your data and we'll get started."
                .to_string(),
            dom_downgrade_message: "I couldn't tell which card to apply {{tool}} to. \
                                    Could you tell me the card's title?"
                .to_string(),
            max_actions: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        if !(1..=2).contains(&config.max_actions) {
            return Err(ConfigError::MaxActions(config.max_actions));
        }
        if config.fallback_step_id.trim().chars().count() < 3 {
            return Err(ConfigError::FallbackStepId);
        }
        Ok(config)
    }

    /// Output cap for this turn: one action in `plan_only`, else `max_actions`.
    pub fn cap(&self, ctx: &EngineContext) -> usize {
        match ctx.prompt_mode {
            PromptMode::PlanOnly => 1,
            PromptMode::Normal => self.max_actions.clamp(1, 2),
        }
    }

    pub fn current_step_id(&self, ctx: &EngineContext) -> String {
        ctx.current_step_id(&self.fallback_step_id)
    }

    pub fn dom_downgrade_text(&self, tool: &str) -> String {
        let tool = if tool.trim().is_empty() { "that action" } else { tool.trim() };
        self.dom_downgrade_message.replace("{{tool}}", tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("fallback_message = \"Ready.\"\n").unwrap();
        assert_eq!(config.fallback_message, "Ready.");
        assert_eq!(config.fallback_step_id, "ad_hoc_response");
        assert_eq!(config.max_actions, 2);
    }

    #[test]
    fn rejects_out_of_range_cap() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_actions = 5"),
            Err(ConfigError::MaxActions(5))
        ));
    }

    #[test]
    fn downgrade_text_names_tool() {
        let config = EngineConfig::default();
        assert!(config.dom_downgrade_text("removeCard").contains("removeCard"));
        assert!(config.dom_downgrade_text("").contains("that action"));
    }
}
