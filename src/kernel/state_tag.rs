use chrono::{DateTime, Utc};

const MAX_HINT_LEN: usize = 24;

/// Mints opaque version tags. Uniqueness comes from the per-instance counter,
/// not from clock resolution, so one factory must not be shared between
/// concurrently running turns without external synchronization.
#[derive(Debug, Default)]
pub struct StateTagFactory {
    counter: u64,
}

impl StateTagFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, now: DateTime<Utc>, hint: Option<&str>) -> String {
        self.counter += 1;
        let hint: String = hint
            .unwrap_or("state")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .take(MAX_HINT_LEN)
            .collect();
        let hint = if hint.is_empty() { "state".to_string() } else { hint };
        format!("st-{:x}-{}-{}", now.timestamp_millis().max(0), self.counter, hint)
    }

    pub fn minted(&self) -> u64 {
        self.counter
    }
}
