//! `{{token}}` substitution over a fixed token set.
//!
//! Unknown tokens and unterminated braces are copied through verbatim.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateToken {
    UserMessage,
    Goal,
    CurrentStep,
    Intent,
    Choices,
}

impl TemplateToken {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "user_message" => Some(TemplateToken::UserMessage),
            "goal" => Some(TemplateToken::Goal),
            "current_step" => Some(TemplateToken::CurrentStep),
            "intent" => Some(TemplateToken::Intent),
            "choices" => Some(TemplateToken::Choices),
            _ => None,
        }
    }
}

/// Values bound to each token for one render.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub user_message: String,
    pub goal: String,
    pub current_step: String,
    pub intent: String,
    pub choices: String,
}

impl TemplateVars {
    fn value(&self, token: TemplateToken) -> &str {
        match token {
            TemplateToken::UserMessage => &self.user_message,
            TemplateToken::Goal => &self.goal,
            TemplateToken::CurrentStep => &self.current_step,
            TemplateToken::Intent => &self.intent,
            TemplateToken::Choices => &self.choices,
        }
    }
}

pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = &after[..close];
                match TemplateToken::parse(name) {
                    Some(token) => out.push_str(vars.value(token)),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
