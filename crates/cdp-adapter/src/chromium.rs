use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AdapterError, AdapterErrorKind, Cdp, CdpConfig, KeyPress, PageId};

const PROBE_SCRIPT: &str = r#"(() => ({
    url: String(window.location.href || ''),
    focused: document.hasFocus(),
    visible: document.visibilityState === 'visible'
}))()"#;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Focus/visibility probe of one open tab.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PageProbe {
    pub url: String,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub visible: bool,
}

impl PageProbe {
    fn is_internal(&self) -> bool {
        let url = self.url.trim();
        url.is_empty()
            || url == "about:blank"
            || url.starts_with("chrome://")
            || url.starts_with("chrome-extension://")
            || url.starts_with("devtools://")
            || url.starts_with("edge://")
    }
}

/// Pick the tab the user is looking at: focused first, then visible, then
/// the first ordinary page.
pub fn pick_active(probes: &[PageProbe]) -> Option<usize> {
    let ordinary = || {
        probes
            .iter()
            .enumerate()
            .filter(|(_, probe)| !probe.is_internal())
    };
    ordinary()
        .find(|(_, p)| p.focused && p.visible)
        .or_else(|| ordinary().find(|(_, p)| p.visible))
        .or_else(|| ordinary().next())
        .map(|(idx, _)| idx)
}

/// Pages we hand out ids for, keyed both ways so a tab seen again keeps
/// its id.
struct PageRegistry<P> {
    pages: DashMap<PageId, P>,
    targets: DashMap<String, PageId>,
}

impl<P: Clone> PageRegistry<P> {
    fn new() -> Self {
        Self {
            pages: DashMap::new(),
            targets: DashMap::new(),
        }
    }

    fn register(&self, target: String, page: P) -> PageId {
        let id = *self.targets.entry(target).or_insert_with(PageId::new);
        self.pages.insert(id, page);
        id
    }

    fn get(&self, id: PageId) -> Option<P> {
        self.pages.get(&id).map(|entry| entry.value().clone())
    }
}

/// `Cdp` implementation backed by a chromiumoxide browser.
pub struct ChromiumCdpAdapter {
    cfg: CdpConfig,
    browser: Mutex<Browser>,
    registry: PageRegistry<Page>,
    handler: JoinHandle<()>,
}

impl ChromiumCdpAdapter {
    /// Attach to `cfg.websocket_url` when set, otherwise launch a browser.
    pub async fn start(cfg: CdpConfig) -> Result<Arc<Self>, AdapterError> {
        let (browser, mut handler) = match &cfg.websocket_url {
            Some(endpoint) => {
                info!(endpoint = %endpoint, "Attaching to running browser");
                Browser::connect(endpoint.clone())
                    .await
                    .map_err(|err| AdapterError::io(format!("connect {}: {}", endpoint, err)))?
            }
            None => {
                info!(
                    executable = %cfg.executable.display(),
                    headless = cfg.headless,
                    "Launching browser"
                );
                Browser::launch(launch_config(&cfg)?)
                    .await
                    .map_err(|err| AdapterError::io(format!("launch: {}", err)))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!("cdp handler stopped: {}", err);
                    break;
                }
            }
        });

        Ok(Arc::new(Self {
            cfg,
            browser: Mutex::new(browser),
            registry: PageRegistry::new(),
            handler,
        }))
    }

    pub fn config(&self) -> &CdpConfig {
        &self.cfg
    }

    /// Close a launched browser, or just detach from an attached one.
    pub async fn shutdown(&self) {
        if !self.cfg.attaches() {
            let mut browser = self.browser.lock().await;
            if let Err(err) = browser.close().await {
                warn!("browser close failed: {}", err);
            }
        }
        self.handler.abort();
    }

    fn register(&self, page: Page) -> PageId {
        let target = page.target_id().inner().clone();
        self.registry.register(target, page)
    }

    fn page(&self, id: PageId) -> Result<Page, AdapterError> {
        self.registry
            .get(id)
            .ok_or_else(|| AdapterError::page_not_found(id))
    }

    async fn probe(page: &Page) -> PageProbe {
        let eval = page.evaluate_expression(PROBE_SCRIPT);
        match tokio::time::timeout(PROBE_TIMEOUT, eval).await {
            Ok(Ok(result)) => result
                .value()
                .cloned()
                .and_then(|value| serde_json::from_value(value).ok())
                .unwrap_or_default(),
            Ok(Err(err)) => {
                debug!("page probe failed: {}", err);
                PageProbe::default()
            }
            Err(_) => PageProbe::default(),
        }
    }
}

fn launch_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    let mut builder = BrowserConfig::builder().user_data_dir(&cfg.user_data_dir);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(&cfg.executable);
    }
    builder
        .build()
        .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err))
}

#[async_trait]
impl Cdp for ChromiumCdpAdapter {
    async fn open_page(&self, url: &str) -> Result<PageId, AdapterError> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(url)
                .await
                .map_err(|err| AdapterError::io(format!("new page {}: {}", url, err)))?
        };
        if let Err(err) = page.bring_to_front().await {
            debug!("bring_to_front failed: {}", err);
        }
        let id = self.register(page);
        debug!(page = %id, url = %url, "Opened page");
        Ok(id)
    }

    async fn active_page(&self) -> Result<PageId, AdapterError> {
        let pages = {
            let mut browser = self.browser.lock().await;
            if let Err(err) = browser.fetch_targets().await {
                debug!("fetch_targets failed: {}", err);
            }
            browser
                .pages()
                .await
                .map_err(|err| AdapterError::io(format!("list pages: {}", err)))?
        };

        let mut probes = Vec::with_capacity(pages.len());
        for page in &pages {
            probes.push(Self::probe(page).await);
        }

        let idx = pick_active(&probes).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint("no ordinary tab is open")
        })?;
        let page = pages[idx].clone();
        debug!(url = %probes[idx].url, "Selected active page");
        Ok(self.register(page))
    }

    async fn evaluate(&self, page: PageId, expression: &str) -> Result<Value, AdapterError> {
        let handle = self.page(page)?;
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err))?;
        let result = handle
            .evaluate_expression(params)
            .await
            .map_err(|err| AdapterError::io(format!("evaluate: {}", err)))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn insert_text(&self, page: PageId, text: &str) -> Result<(), AdapterError> {
        let handle = self.page(page)?;
        handle
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|err| AdapterError::io(format!("insertText: {}", err)))?;
        Ok(())
    }

    async fn press_key(&self, page: PageId, key: KeyPress) -> Result<(), AdapterError> {
        let handle = self.page(page)?;
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(key.key())
                .code(key.key())
                .windows_virtual_key_code(key.key_code())
                .native_virtual_key_code(key.key_code());
            if let (DispatchKeyEventType::KeyDown, Some(text)) = (&kind, key.text()) {
                builder = builder.text(text);
            }
            let params = builder
                .build()
                .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err))?;
            handle
                .execute(params)
                .await
                .map_err(|err| AdapterError::io(format!("dispatchKeyEvent: {}", err)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(url: &str, focused: bool, visible: bool) -> PageProbe {
        PageProbe {
            url: url.into(),
            focused,
            visible,
        }
    }

    #[test]
    fn focused_visible_tab_wins() {
        let probes = vec![
            probe("https://a.test", false, true),
            probe("https://b.test", true, true),
        ];
        assert_eq!(pick_active(&probes), Some(1));
    }

    #[test]
    fn internal_pages_are_skipped() {
        let probes = vec![
            probe("chrome://newtab/", true, true),
            probe("devtools://devtools/x", true, true),
            probe("https://news.test/story", false, false),
        ];
        assert_eq!(pick_active(&probes), Some(2));
    }

    #[test]
    fn visible_beats_hidden() {
        let probes = vec![
            probe("https://hidden.test", false, false),
            probe("https://shown.test", false, true),
        ];
        assert_eq!(pick_active(&probes), Some(1));
    }

    #[test]
    fn same_target_keeps_its_page_id() {
        let registry = PageRegistry::new();
        let first = registry.register("T1".to_string(), "tab one");
        let again = registry.register("T1".to_string(), "tab one, refreshed");
        let other = registry.register("T2".to_string(), "tab two");

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(registry.pages.len(), 2);
        assert_eq!(registry.get(first), Some("tab one, refreshed"));
        assert_eq!(registry.get(PageId::new()), None);
    }

    #[test]
    fn nothing_ordinary_means_none() {
        assert_eq!(pick_active(&[probe("about:blank", true, true)]), None);
        assert_eq!(pick_active(&[]), None);
    }
}
