//! Turning a page snapshot and a prompt template into the message we relay.

use std::fmt;
use std::str::FromStr;

use chatrelay_core_types::PageSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Marker appended to truncated messages. Together with the preceding
/// newline it is budgeted as 14 chars.
pub const TRUNCATION_MARKER: &str = "[TRUNCATED]";
const TRUNCATION_RESERVE: usize = 14;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("unknown send mode '{0}' (expected url or content)")]
    UnknownMode(String),
    #[error("unknown truncate strategy '{0}' (expected truncate or abort)")]
    UnknownStrategy(String),
}

/// What follows the prompt: the page URL or the captured page text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    #[default]
    Url,
    Content,
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendMode::Url => "url",
            SendMode::Content => "content",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(SendMode::Url),
            "content" => Ok(SendMode::Content),
            _ => Err(ComposeError::UnknownMode(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncateStrategy {
    #[default]
    Truncate,
    Abort,
}

impl TruncateStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TruncateStrategy::Truncate => "truncate",
            TruncateStrategy::Abort => "abort",
        }
    }
}

impl fmt::Display for TruncateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TruncateStrategy {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(TruncateStrategy::Truncate),
            "abort" => Ok(TruncateStrategy::Abort),
            _ => Err(ComposeError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Replace each `{key}` in `body`. A `None` value empties the placeholder;
/// placeholders without a variable are left as written.
pub fn format_template(body: &str, vars: &[(&str, Option<&str>)]) -> String {
    vars.iter().fold(body.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value.unwrap_or(""))
    })
}

/// [`format_template`] with the snapshot's url, title, selection and content.
pub fn format_for_page(body: &str, page: &PageSnapshot) -> String {
    let vars: Vec<(&str, Option<&str>)> = page
        .template_vars()
        .into_iter()
        .map(|(key, value)| (key, Some(value)))
        .collect();
    format_template(body, &vars)
}

pub fn build_message(mode: SendMode, prompt: &str, page: &PageSnapshot) -> String {
    let tail = match mode {
        SendMode::Url => page.url.clone(),
        SendMode::Content => format!("```text\n{}\n```", page.content),
    };
    format!("{}\n{}", prompt, tail).trim().to_string()
}

/// Outcome of [`enforce_size_limit`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SizeCheck {
    pub text: String,
    pub truncated: bool,
    pub aborted: bool,
}

/// Keep `text` within `max_chars` characters.
pub fn enforce_size_limit(text: &str, max_chars: usize, strategy: TruncateStrategy) -> SizeCheck {
    let len = text.chars().count();
    if len <= max_chars {
        return SizeCheck {
            text: text.to_string(),
            truncated: false,
            aborted: false,
        };
    }
    match strategy {
        TruncateStrategy::Abort => {
            debug!(len, max_chars, "Message over limit, aborting");
            SizeCheck {
                text: text.to_string(),
                truncated: false,
                aborted: true,
            }
        }
        TruncateStrategy::Truncate => {
            let keep = max_chars.saturating_sub(TRUNCATION_RESERVE);
            let head: String = text.chars().take(keep).collect();
            debug!(len, max_chars, keep, "Message over limit, truncating");
            SizeCheck {
                text: format!("{}\n{}", head, TRUNCATION_MARKER),
                truncated: true,
                aborted: false,
            }
        }
    }
}

/// A prompt and the message built from it, as shown in a preview.
#[derive(Clone, Debug, Serialize)]
pub struct Composition {
    pub prompt: String,
    pub mode: SendMode,
    pub message: String,
    pub chars: usize,
    pub size: SizeCheck,
}

impl Composition {
    pub fn new(
        prompt: impl Into<String>,
        mode: SendMode,
        page: &PageSnapshot,
        max_chars: usize,
        strategy: TruncateStrategy,
    ) -> Self {
        let prompt = prompt.into();
        let message = build_message(mode, &prompt, page);
        let size = enforce_size_limit(&message, max_chars, strategy);
        Self {
            chars: message.chars().count(),
            prompt,
            mode,
            message,
            size,
        }
    }
}
