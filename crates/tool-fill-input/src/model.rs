use std::fmt;

use action_locator::ElementKind;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Verification;

/// Ways of putting text into an element.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillStrategy {
    /// Prototype `value` setter plus `input`/`change` events
    NativeSetter,
    /// `document.execCommand('insertText')` over a full selection
    ExecCommand,
    /// Synthetic `paste` event carrying a `DataTransfer`
    ClipboardPaste,
    /// Trusted `Input.insertText` from the browser process
    CdpInsertText,
    /// Rebuild contenteditable children by hand
    DirectDom,
}

const VALUE_CHAIN: &[FillStrategy] = &[
    FillStrategy::NativeSetter,
    FillStrategy::ExecCommand,
    FillStrategy::CdpInsertText,
];

const EDITABLE_CHAIN: &[FillStrategy] = &[
    FillStrategy::ExecCommand,
    FillStrategy::ClipboardPaste,
    FillStrategy::CdpInsertText,
    FillStrategy::DirectDom,
];

impl FillStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            FillStrategy::NativeSetter => "native-setter",
            FillStrategy::ExecCommand => "exec-command",
            FillStrategy::ClipboardPaste => "clipboard-paste",
            FillStrategy::CdpInsertText => "cdp-insert-text",
            FillStrategy::DirectDom => "direct-dom",
        }
    }

    /// Strategies to try, in order, for an element kind. Empty when the
    /// element does not take text.
    pub fn chain_for(kind: ElementKind) -> &'static [FillStrategy] {
        match kind {
            ElementKind::TextArea | ElementKind::TextInput => VALUE_CHAIN,
            ElementKind::ContentEditable => EDITABLE_CHAIN,
            ElementKind::Button | ElementKind::Other => &[],
        }
    }
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the page said after a strategy ran.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApplyAck {
    Applied,
    /// The strategy does not apply to this element or was refused
    Declined(String),
    /// The handle no longer resolves
    Stale,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptResult {
    TargetMissing,
    LocateFailed { error: String },
    NotFillable { kind: ElementKind },
    Declined { reason: String },
    ApplyFailed { error: String },
    Stale,
    Observed { verification: Verification },
}

/// One line of the fill trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub attempt: u32,
    pub strategy: Option<FillStrategy>,
    #[serde(flatten)]
    pub result: AttemptResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FillOutcome {
    Verified {
        strategy: FillStrategy,
        attempt: u32,
    },
    /// The element was never found
    TargetMissing,
    /// Found at least once but no strategy produced the expected content
    Unverified { last: Option<Verification> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FillReport {
    pub outcome: FillOutcome,
    pub attempts_used: u32,
    pub trail: Vec<StrategyAttempt>,
}

impl FillReport {
    pub fn is_verified(&self) -> bool {
        matches!(self.outcome, FillOutcome::Verified { .. })
    }

    pub fn strategy(&self) -> Option<FillStrategy> {
        match self.outcome {
            FillOutcome::Verified { strategy, .. } => Some(strategy),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_follow_element_kind() {
        assert_eq!(
            FillStrategy::chain_for(ElementKind::TextArea)[0],
            FillStrategy::NativeSetter
        );
        assert_eq!(
            FillStrategy::chain_for(ElementKind::ContentEditable).last(),
            Some(&FillStrategy::DirectDom)
        );
        assert!(!FillStrategy::chain_for(ElementKind::ContentEditable)
            .contains(&FillStrategy::NativeSetter));
        assert!(FillStrategy::chain_for(ElementKind::Button).is_empty());
    }

    #[test]
    fn trail_serializes_flat() {
        let line = StrategyAttempt {
            attempt: 2,
            strategy: Some(FillStrategy::ClipboardPaste),
            result: AttemptResult::Observed {
                verification: Verification::Empty,
            },
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["strategy"], "clipboard-paste");
        assert_eq!(value["result"], "observed");
        assert_eq!(value["verification"]["verdict"], "empty");
    }
}
