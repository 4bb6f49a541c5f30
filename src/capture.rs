//! Reading the page the user is looking at.

use chatrelay_core_types::PageSnapshot;
use cdp_adapter::{Cdp, PageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settings_store::{ExtractionMode, Settings};
use tracing::{debug, warn};

use crate::errors::RelayError;

/// Regions tried, in order, before falling back to the whole body.
pub const READABLE_CANDIDATES: [&str; 4] = ["main article", "article", "main", r#"[role="main"]"#];

/// A region must hold more text than this to count as the readable part.
pub const READABLE_MIN_CHARS: usize = 200;

const PROBE_SCRIPT: &str = "({ url: String(location.href), title: String(document.title || '') })";

#[derive(Debug, Deserialize)]
struct Probe {
    url: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct Extracted {
    #[serde(default)]
    selection: String,
    #[serde(default)]
    content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PageCapture {
    pub page: PageSnapshot,
    pub mode: ExtractionMode,
    /// False when only the URL and title could be read
    pub complete: bool,
    pub captured_at: DateTime<Utc>,
}

pub fn extraction_script(mode: ExtractionMode) -> String {
    let candidates = serde_json::to_string(&READABLE_CANDIDATES).unwrap_or_else(|_| "[]".into());
    let raw = matches!(mode, ExtractionMode::Raw);
    format!(
        r#"(() => {{
    const candidates = {candidates};
    const bodyText = () => (document.body ? String(document.body.innerText || '').trim() : '');
    const readable = () => {{
        for (const selector of candidates) {{
            const node = document.querySelector(selector);
            if (node && node.innerText && node.innerText.trim().length > {min_chars}) {{
                return node.innerText.trim();
            }}
        }}
        return bodyText();
    }};
    const sel = window.getSelection();
    return {{
        selection: sel ? sel.toString() : '',
        content: {raw} ? bodyText() : readable()
    }};
}})()"#,
        candidates = candidates,
        min_chars = READABLE_MIN_CHARS,
        raw = raw,
    )
}

/// Extraction mode for a host, honouring domain exceptions.
pub fn mode_for_host(settings: &Settings, host: &str) -> ExtractionMode {
    settings
        .extraction_override(host)
        .unwrap_or(settings.extraction_mode)
}

/// Capture url, title, selection and readable text of the active tab.
pub async fn capture_active_page(
    cdp: &dyn Cdp,
    settings: &Settings,
) -> Result<PageCapture, RelayError> {
    let page = cdp.active_page().await?;
    capture_page(cdp, page, settings).await
}

pub async fn capture_page(
    cdp: &dyn Cdp,
    page: PageId,
    settings: &Settings,
) -> Result<PageCapture, RelayError> {
    let probe: Probe = serde_json::from_value(cdp.evaluate(page, PROBE_SCRIPT).await?)
        .map_err(|err| RelayError::Capture(format!("unreadable page probe: {}", err)))?;
    let mut snapshot = PageSnapshot::new(probe.url, probe.title);
    let mode = mode_for_host(settings, &snapshot.host());
    debug!(url = %snapshot.url, ?mode, "Capturing page");

    let extracted = match cdp.evaluate(page, &extraction_script(mode)).await {
        Ok(value) => serde_json::from_value::<Extracted>(value)
            .map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };
    let complete = match extracted {
        Ok(extracted) => {
            snapshot.selection = extracted.selection;
            snapshot.content = extracted.content;
            true
        }
        Err(err) => {
            warn!(url = %snapshot.url, "Unable to read page text, sending URL only: {}", err);
            false
        }
    };

    Ok(PageCapture {
        page: snapshot,
        mode,
        complete,
        captured_at: Utc::now(),
    })
}
