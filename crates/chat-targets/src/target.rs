use std::fmt;
use std::str::FromStr;

use action_locator::{ElementRole, SelectorChain};
use serde::{Deserialize, Serialize};

use crate::errors::TargetError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    #[serde(rename = "chatgpt")]
    ChatGpt,
    #[serde(rename = "gemini")]
    Gemini,
}

impl TargetKind {
    pub const ALL: [TargetKind; 2] = [TargetKind::ChatGpt, TargetKind::Gemini];

    pub fn key(&self) -> &'static str {
        match self {
            TargetKind::ChatGpt => "chatgpt",
            TargetKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TargetKind {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatgpt" => Ok(TargetKind::ChatGpt),
            "gemini" => Ok(TargetKind::Gemini),
            _ => Err(TargetError::UnknownTarget(s.to_string())),
        }
    }
}

/// Everything we know about one chat UI.
#[derive(Clone, Debug)]
pub struct ChatTarget {
    pub kind: TargetKind,
    pub name: &'static str,
    new_chat_url: &'static str,
    pub input: SelectorChain,
    pub send_button: SelectorChain,
    pub model_picker: Option<SelectorChain>,
    pub model_options: SelectorChain,
}

const MENU_OPTIONS: [&str; 3] = [
    r#"[role="menuitem"]"#,
    r#"[role="menuitemradio"]"#,
    r#"[data-testid^="model-switcher-"]"#,
];

impl ChatTarget {
    pub fn for_kind(kind: TargetKind) -> Self {
        match kind {
            TargetKind::ChatGpt => Self {
                kind,
                name: "ChatGPT",
                new_chat_url: "https://chat.openai.com/?new_chat=true",
                input: SelectorChain::new(
                    ElementRole::MessageInput,
                    [
                        r#"#prompt-textarea[contenteditable="true"]"#,
                        r#"div.ProseMirror[contenteditable="true"]"#,
                        "textarea#prompt-textarea",
                        "textarea",
                    ],
                ),
                send_button: SelectorChain::new(
                    ElementRole::SendButton,
                    [
                        r#"button[data-testid="send-button"]"#,
                        "#composer-submit-button",
                        r#"button[aria-label="Send prompt"]"#,
                        r#"form button[type="submit"]"#,
                    ],
                ),
                model_picker: Some(SelectorChain::new(
                    ElementRole::ModelPicker,
                    [r#"button[data-testid="model-switcher-button"]"#],
                )),
                model_options: SelectorChain::new(ElementRole::ModelOption, MENU_OPTIONS),
            },
            TargetKind::Gemini => Self {
                kind,
                name: "Gemini",
                new_chat_url: "https://gemini.google.com/app",
                input: SelectorChain::new(
                    ElementRole::MessageInput,
                    [
                        r#"rich-textarea .ql-editor[contenteditable="true"]"#,
                        r#"div.ql-editor[contenteditable="true"]"#,
                        "textarea[aria-label]",
                        "textarea",
                    ],
                ),
                send_button: SelectorChain::new(
                    ElementRole::SendButton,
                    [
                        "button.send-button",
                        r#"button[aria-label="Send message"]"#,
                        r#"button[aria-label="Send"]"#,
                        r#"button[type="submit"]"#,
                    ],
                ),
                model_picker: None,
                model_options: SelectorChain::new(ElementRole::ModelOption, MENU_OPTIONS),
            },
        }
    }

    pub fn resolve(key: &str) -> Result<Self, TargetError> {
        key.parse().map(Self::for_kind)
    }

    pub fn all() -> Vec<ChatTarget> {
        TargetKind::ALL.iter().copied().map(Self::for_kind).collect()
    }

    pub fn supports_models(&self) -> bool {
        self.model_picker.is_some()
    }

    /// New-chat URL. Gemini serves signed-in account `n` under `/u/n/`.
    pub fn new_chat_url(&self, account_index: u32) -> String {
        match self.kind {
            TargetKind::Gemini if account_index > 0 => {
                format!("https://gemini.google.com/u/{}/app", account_index)
            }
            _ => self.new_chat_url.to_string(),
        }
    }
}
