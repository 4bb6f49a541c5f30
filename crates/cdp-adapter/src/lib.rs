//! Chromium DevTools Protocol adapter for chatrelay.
//!
//! Upper layers only see the [`Cdp`] trait: open a tab, find the tab the user
//! is looking at, evaluate a script, and send trusted input. The concrete
//! [`ChromiumCdpAdapter`] drives a real browser through `chromiumoxide`.

use async_trait::async_trait;
use serde_json::Value;

mod chromium;
mod ready;

pub use chromium::{pick_active, ChromiumCdpAdapter, PageProbe};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use ids::PageId;
pub use ready::{wait_document_ready, DEFAULT_READY_POLL};

pub mod ids {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use uuid::Uuid;

    /// Unique identifier for a page/tab tracked by the adapter.
    #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
    pub struct PageId(pub Uuid);

    impl PageId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for PageId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl fmt::Display for PageId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
}

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
    pub enum AdapterErrorKind {
        #[error("navigation timed out")]
        NavTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("target page not found")]
        TargetNotFound,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            let retriable = matches!(kind, AdapterErrorKind::CdpIo | AdapterErrorKind::NavTimeout);
            Self {
                kind,
                hint: None,
                retriable,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn io(hint: impl Into<String>) -> Self {
            Self::new(AdapterErrorKind::CdpIo).with_hint(hint)
        }

        pub fn page_not_found(page: super::PageId) -> Self {
            Self::new(AdapterErrorKind::TargetNotFound).with_hint(format!("page {}", page))
        }
    }
}

pub mod config {
    use serde::{Deserialize, Serialize};
    use std::{
        env,
        path::{Path, PathBuf},
    };
    use which::which;

    /// Configuration for launching or attaching to a browser.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        /// DevTools endpoint of an already running browser. Either the
        /// `ws://` browser URL or the `http://host:port` debugging address.
        pub websocket_url: Option<String>,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable().unwrap_or_default(),
                user_data_dir: default_profile_dir(),
                headless: false,
                websocket_url: env::var("CHATRELAY_CDP_URL")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
            }
        }
    }

    impl CdpConfig {
        /// Attaching reuses the user's logged-in browser profile.
        pub fn attaches(&self) -> bool {
            self.websocket_url.is_some()
        }
    }

    fn default_profile_dir() -> PathBuf {
        if let Ok(path) = env::var("CHATRELAY_CHROME_PROFILE") {
            return PathBuf::from(path);
        }
        Path::new("./.chatrelay-profile").into()
    }

    pub fn detect_chrome_executable() -> Option<PathBuf> {
        if let Ok(raw) = env::var("CHATRELAY_CHROME") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let candidate = PathBuf::from(trimmed);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }

        for name in chrome_executable_names() {
            if let Ok(path) = which(name) {
                return Some(path);
            }
        }

        os_specific_chrome_paths()
            .into_iter()
            .find(|candidate| candidate.exists())
    }

    fn chrome_executable_names() -> &'static [&'static str] {
        #[cfg(target_os = "windows")]
        {
            &["chrome.exe", "chromium.exe", "msedge.exe"]
        }

        #[cfg(not(target_os = "windows"))]
        {
            &[
                "google-chrome-stable",
                "google-chrome",
                "chromium",
                "chromium-browser",
            ]
        }
    }

    fn os_specific_chrome_paths() -> Vec<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            vec![
                PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
                PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            ]
        }

        #[cfg(any(target_os = "linux", target_os = "freebsd"))]
        {
            vec![
                PathBuf::from("/usr/bin/google-chrome-stable"),
                PathBuf::from("/usr/bin/google-chrome"),
                PathBuf::from("/usr/bin/chromium-browser"),
                PathBuf::from("/usr/bin/chromium"),
            ]
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
        {
            Vec::new()
        }
    }
}

/// Trusted keys the automation layer needs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyPress {
    Enter,
    Escape,
}

impl KeyPress {
    pub fn key(&self) -> &'static str {
        match self {
            KeyPress::Enter => "Enter",
            KeyPress::Escape => "Escape",
        }
    }

    pub fn key_code(&self) -> i64 {
        match self {
            KeyPress::Enter => 13,
            KeyPress::Escape => 27,
        }
    }

    pub fn text(&self) -> Option<&'static str> {
        match self {
            KeyPress::Enter => Some("\r"),
            KeyPress::Escape => None,
        }
    }
}

/// Minimal CDP capability surface required by upper layers.
#[async_trait]
pub trait Cdp: Send + Sync {
    /// Open `url` in a new foreground tab.
    async fn open_page(&self, url: &str) -> Result<PageId, AdapterError>;

    /// The tab the user is currently looking at.
    async fn active_page(&self) -> Result<PageId, AdapterError>;

    /// Evaluate an expression, awaiting promises and returning by value.
    async fn evaluate(&self, page: PageId, expression: &str) -> Result<Value, AdapterError>;

    /// `Input.insertText` into whatever element has focus.
    async fn insert_text(&self, page: PageId, text: &str) -> Result<(), AdapterError>;

    async fn press_key(&self, page: PageId, key: KeyPress) -> Result<(), AdapterError>;
}
