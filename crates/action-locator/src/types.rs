//! Core types for locator system

use cdp_adapter::PageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::errors::LocatorError;

/// What a selector chain is looking for. Used for logging and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementRole {
    MessageInput,
    SendButton,
    ModelPicker,
    ModelOption,
    Content,
}

impl ElementRole {
    pub fn name(&self) -> &'static str {
        match self {
            ElementRole::MessageInput => "message-input",
            ElementRole::SendButton => "send-button",
            ElementRole::ModelPicker => "model-picker",
            ElementRole::ModelOption => "model-option",
            ElementRole::Content => "content",
        }
    }
}

impl fmt::Display for ElementRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered selector candidates; earlier candidates are preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorChain {
    pub role: ElementRole,
    pub candidates: Vec<String>,
}

impl SelectorChain {
    pub fn new<I, S>(role: ElementRole, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role,
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject chains that could never match anything.
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.candidates.is_empty() {
            return Err(LocatorError::InvalidChain(format!(
                "{} chain has no candidates",
                self.role
            )));
        }
        if let Some(pos) = self.candidates.iter().position(|c| c.trim().is_empty()) {
            return Err(LocatorError::InvalidChain(format!(
                "{} candidate #{} is blank",
                self.role, pos
            )));
        }
        Ok(())
    }
}

/// How an element takes text, as classified by the page script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    #[serde(rename = "textarea")]
    TextArea,
    TextInput,
    #[serde(rename = "contenteditable")]
    ContentEditable,
    Button,
    #[serde(other)]
    Other,
}

impl ElementKind {
    pub fn is_fillable(&self) -> bool {
        matches!(
            self,
            ElementKind::TextArea | ElementKind::TextInput | ElementKind::ContentEditable
        )
    }
}

/// One element reported by the locate script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMatch {
    /// Index of the candidate selector that produced this match
    pub candidate: usize,
    pub selector: String,
    pub handle: String,
    pub tag: String,
    pub kind: ElementKind,
    pub visible: bool,
    pub enabled: bool,
    /// Number of shadow roots between the document and the element
    #[serde(default)]
    pub shadow_depth: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub testid: Option<String>,
}

impl ElementMatch {
    pub fn is_ready(&self) -> bool {
        self.visible && self.enabled
    }

    /// Case-insensitive label comparison used for menu options.
    pub fn matches_label(&self, wanted: &str) -> bool {
        let wanted = normalize_label(wanted);
        if wanted.is_empty() {
            return false;
        }
        if normalize_label(&self.text) == wanted {
            return true;
        }
        self.testid
            .as_deref()
            .map(|id| id.to_lowercase().ends_with(&format!("-{}", wanted)))
            .unwrap_or(false)
    }
}

/// The element chosen from a chain, bound to the page it lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedElement {
    pub page: PageId,
    pub role: ElementRole,
    pub handle: String,
    pub selector: String,
    pub candidate: usize,
    pub kind: ElementKind,
    pub shadow_depth: u32,
    pub visible: bool,
    pub enabled: bool,
    pub text: String,
}

impl LocatedElement {
    pub fn from_match(page: PageId, role: ElementRole, m: &ElementMatch) -> Self {
        Self {
            page,
            role,
            handle: m.handle.clone(),
            selector: m.selector.clone(),
            candidate: m.candidate,
            kind: m.kind,
            shadow_depth: m.shadow_depth,
            visible: m.visible,
            enabled: m.enabled,
            text: m.text.clone(),
        }
    }
}

/// Polling knobs for [`crate::ElementLocator::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocateOptions {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll: Duration::from_millis(250),
        }
    }
}

impl LocateOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Lowercase and collapse whitespace so "GPT-4o\n mini" == "gpt-4o mini".
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
