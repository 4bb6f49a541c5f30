use std::time::Duration;

use cdp_adapter::KeyPress;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::TargetError;
use crate::surface::ChatSurface;
use crate::target::ChatTarget;

#[derive(Clone, Debug)]
pub struct SendPolicy {
    pub attempts: u32,
    pub retry_delay: Duration,
    /// Wait after a click before checking the composer
    pub settle: Duration,
}

impl SendPolicy {
    pub fn new(attempts: u32, retry_delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            retry_delay: Duration::from_millis(retry_delay_ms),
            settle: Duration::from_millis(400),
        }
    }
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self::new(1, 800)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum SendAttempt {
    Clicked { attempt: u32 },
    /// The button never worked but a trusted Enter did
    EnterKey,
    Failed { attempts: u32 },
}

impl SendAttempt {
    pub fn is_sent(&self) -> bool {
        !matches!(self, SendAttempt::Failed { .. })
    }
}

/// Submit whatever the composer holds.
///
/// A send only counts once the composer reads back empty (or is gone, which
/// happens when the UI swaps to the conversation view).
pub async fn auto_send(
    surface: &dyn ChatSurface,
    target: &ChatTarget,
    policy: &SendPolicy,
) -> Result<SendAttempt, TargetError> {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        let button = match surface.find(&target.send_button).await {
            Ok(found) => found,
            Err(err) if err.is_retryable() => {
                debug!(attempt, "Send button lookup failed: {}", err);
                None
            }
            Err(err) => return Err(err),
        };

        match button {
            Some(button) => {
                if surface.click(&button).await? {
                    sleep(policy.settle).await;
                    if composer_cleared(surface, target).await? {
                        info!(chat = %target.kind, attempt, selector = %button.selector, "Message sent");
                        return Ok(SendAttempt::Clicked { attempt });
                    }
                    debug!(attempt, "Clicked send but composer still holds text");
                } else {
                    debug!(attempt, "Send button not clickable");
                }
            }
            None => debug!(attempt, "Send button not found"),
        }

        if attempt < attempts {
            sleep(policy.retry_delay).await;
        }
    }

    surface.press_key(KeyPress::Enter).await?;
    sleep(policy.settle).await;
    if composer_cleared(surface, target).await? {
        info!(chat = %target.kind, "Message sent with Enter");
        return Ok(SendAttempt::EnterKey);
    }

    warn!(chat = %target.kind, attempts, "Auto-send failed");
    Ok(SendAttempt::Failed { attempts })
}

async fn composer_cleared(
    surface: &dyn ChatSurface,
    target: &ChatTarget,
) -> Result<bool, TargetError> {
    match surface.read_text(&target.input).await {
        Ok(Some(text)) => Ok(text.trim().is_empty()),
        Ok(None) => Ok(true),
        Err(err) if err.is_retryable() => Ok(false),
        Err(err) => Err(err),
    }
}
