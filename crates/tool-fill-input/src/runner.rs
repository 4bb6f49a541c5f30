use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::FillError;
use crate::fingerprint::{Fingerprint, Verification};
use crate::model::{ApplyAck, AttemptResult, FillOutcome, FillReport, FillStrategy, StrategyAttempt};
use crate::policy::FillPolicy;
use crate::ports::FillPort;
use crate::redact;

/// Fill `text` into the port's element and confirm it by reading it back.
///
/// Every attempt re-locates the element, then walks the strategy chain for
/// its kind until one reads back matching the fingerprint. A stale handle
/// ends the attempt early. Attempts are separated by `policy.retry_delay()`.
#[instrument(skip_all, fields(chars = text.chars().count(), attempts = policy.attempts()))]
pub async fn fill_verified(
    port: &dyn FillPort,
    text: &str,
    policy: &FillPolicy,
    cancel: &CancellationToken,
) -> Result<FillReport, FillError> {
    if text.chars().count() > policy.max_text_len {
        return Err(FillError::TextTooLong(policy.max_text_len));
    }

    let fingerprint = Fingerprint::of(text);
    let attempts = policy.attempts();
    let mut trail = Vec::new();
    let mut located_once = false;
    let mut last_seen: Option<Verification> = None;
    debug!(preview = %redact::preview(text, 48), "Starting verified fill");

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(FillError::Cancelled);
        }

        let element = match port.locate().await {
            Ok(Some(element)) => Some(element),
            Ok(None) => {
                debug!(attempt, "Input not found");
                trail.push(StrategyAttempt {
                    attempt,
                    strategy: None,
                    result: AttemptResult::TargetMissing,
                });
                None
            }
            Err(err) if err.is_retryable() => {
                debug!(attempt, "Locate failed: {}", err);
                trail.push(StrategyAttempt {
                    attempt,
                    strategy: None,
                    result: AttemptResult::LocateFailed {
                        error: err.to_string(),
                    },
                });
                None
            }
            Err(err) => return Err(err.into()),
        };

        if let Some(element) = element {
            located_once = true;
            let chain = FillStrategy::chain_for(element.kind);
            if chain.is_empty() {
                debug!(attempt, kind = ?element.kind, "Located element does not take text");
                trail.push(StrategyAttempt {
                    attempt,
                    strategy: None,
                    result: AttemptResult::NotFillable { kind: element.kind },
                });
            }

            for &strategy in chain {
                if cancel.is_cancelled() {
                    return Err(FillError::Cancelled);
                }
                let ack = match port.apply(&element, strategy, text).await {
                    Ok(ack) => ack,
                    Err(err) => {
                        debug!(attempt, %strategy, "Strategy errored: {}", err);
                        trail.push(StrategyAttempt {
                            attempt,
                            strategy: Some(strategy),
                            result: AttemptResult::ApplyFailed {
                                error: err.to_string(),
                            },
                        });
                        continue;
                    }
                };
                match ack {
                    ApplyAck::Applied => {}
                    ApplyAck::Declined(reason) => {
                        trail.push(StrategyAttempt {
                            attempt,
                            strategy: Some(strategy),
                            result: AttemptResult::Declined { reason },
                        });
                        continue;
                    }
                    ApplyAck::Stale => {
                        trail.push(StrategyAttempt {
                            attempt,
                            strategy: Some(strategy),
                            result: AttemptResult::Stale,
                        });
                        break;
                    }
                }

                pause(policy.settle(), cancel).await?;

                let observed = match port.read_back(&element).await {
                    Ok(Some(observed)) => observed,
                    Ok(None) => {
                        trail.push(StrategyAttempt {
                            attempt,
                            strategy: Some(strategy),
                            result: AttemptResult::Stale,
                        });
                        break;
                    }
                    Err(err) => {
                        trail.push(StrategyAttempt {
                            attempt,
                            strategy: Some(strategy),
                            result: AttemptResult::ApplyFailed {
                                error: err.to_string(),
                            },
                        });
                        break;
                    }
                };

                let verification = fingerprint.verify(&observed);
                trail.push(StrategyAttempt {
                    attempt,
                    strategy: Some(strategy),
                    result: AttemptResult::Observed { verification },
                });
                last_seen = Some(verification);
                if verification.is_match() {
                    info!(
                        attempt,
                        %strategy,
                        selector = %element.selector,
                        shadow_depth = element.shadow_depth,
                        "Fill verified"
                    );
                    return Ok(FillReport {
                        outcome: FillOutcome::Verified { strategy, attempt },
                        attempts_used: attempt,
                        trail,
                    });
                }
                debug!(attempt, %strategy, ?verification, "Fill not verified");
            }
        }

        if attempt < attempts {
            pause(policy.retry_delay(), cancel).await?;
        }
    }

    let outcome = if located_once {
        FillOutcome::Unverified { last: last_seen }
    } else {
        FillOutcome::TargetMissing
    };
    warn!(?outcome, attempts, "Fill gave up");
    Ok(FillReport {
        outcome,
        attempts_used: attempts,
        trail,
    })
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), FillError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(FillError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
