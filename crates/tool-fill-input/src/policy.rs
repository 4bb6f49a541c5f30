use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FillPolicy {
    pub attempts: u32,
    pub retry_delay_ms: u64,
    /// Pause between applying a strategy and reading the element back
    pub settle_ms: u64,
    pub max_text_len: usize,
}

impl Default for FillPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_ms: 800,
            settle_ms: 150,
            max_text_len: 200_000,
        }
    }
}

impl FillPolicy {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
