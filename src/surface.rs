//! Chat tabs backed by a real browser.

use std::sync::Arc;
use std::time::Duration;

use action_locator::{
    ElementLocator, LocateOptions, LocatedElement, LocatorError, ScriptLocator, SelectorChain,
};
use async_trait::async_trait;
use cdp_adapter::{
    wait_document_ready, AdapterErrorKind, Cdp, KeyPress, PageId, DEFAULT_READY_POLL,
};
use chat_targets::{ChatSurface, SurfaceOpener, TargetError, SURFACE_POLL};
use tokio_util::sync::CancellationToken;
use tool_fill_input::{fill_verified, CdpFillPort, FillPolicy, FillReport};
use tracing::{debug, warn};

pub struct CdpChatSurface {
    cdp: Arc<dyn Cdp>,
    locator: Arc<dyn ElementLocator>,
    page: PageId,
}

impl CdpChatSurface {
    pub fn new(cdp: Arc<dyn Cdp>, page: PageId) -> Self {
        let locator: Arc<dyn ElementLocator> = Arc::new(ScriptLocator::new(cdp.clone()));
        Self { cdp, locator, page }
    }
}

#[async_trait]
impl ChatSurface for CdpChatSurface {
    fn page(&self) -> PageId {
        self.page
    }

    async fn find(&self, chain: &SelectorChain) -> Result<Option<LocatedElement>, TargetError> {
        Ok(self.locator.locate(self.page, chain).await?)
    }

    async fn find_text(
        &self,
        chain: &SelectorChain,
        text: &str,
    ) -> Result<Option<LocatedElement>, TargetError> {
        Ok(self.locator.locate_by_text(self.page, chain, text).await?)
    }

    async fn list_texts(&self, chain: &SelectorChain) -> Result<Vec<String>, TargetError> {
        Ok(self.locator.list_texts(self.page, chain).await?)
    }

    async fn click(&self, element: &LocatedElement) -> Result<bool, TargetError> {
        Ok(self.locator.click(element).await?)
    }

    async fn press_key(&self, key: KeyPress) -> Result<(), TargetError> {
        Ok(self.cdp.press_key(self.page, key).await?)
    }

    async fn fill(
        &self,
        chain: &SelectorChain,
        text: &str,
        policy: &FillPolicy,
        cancel: &CancellationToken,
    ) -> Result<FillReport, TargetError> {
        let port = CdpFillPort::new(
            self.cdp.clone(),
            self.locator.clone(),
            self.page,
            chain.clone(),
        );
        Ok(fill_verified(&port, text, policy, cancel).await?)
    }

    async fn read_text(&self, chain: &SelectorChain) -> Result<Option<String>, TargetError> {
        match self.locator.locate(self.page, chain).await? {
            Some(element) => Ok(self.locator.read_text(&element).await?),
            None => Ok(None),
        }
    }

    async fn wait_for(
        &self,
        chain: &SelectorChain,
        timeout: Duration,
    ) -> Result<Option<LocatedElement>, TargetError> {
        let opts = LocateOptions {
            timeout,
            poll: SURFACE_POLL,
        };
        match self.locator.wait_for(self.page, chain, opts).await {
            Ok(found) => Ok(Some(found)),
            Err(LocatorError::Timeout(reason)) => {
                debug!(role = %chain.role, "{}", reason);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Opens chat tabs in the attached browser.
pub struct CdpSurfaceOpener {
    cdp: Arc<dyn Cdp>,
    ready_timeout: Duration,
}

impl CdpSurfaceOpener {
    pub fn new(cdp: Arc<dyn Cdp>, ready_timeout: Duration) -> Self {
        Self { cdp, ready_timeout }
    }
}

#[async_trait]
impl SurfaceOpener for CdpSurfaceOpener {
    async fn open(&self, url: &str) -> Result<Arc<dyn ChatSurface>, TargetError> {
        let page = self.cdp.open_page(url).await?;
        debug!(page = %page, url, "Opened chat tab");
        match wait_document_ready(self.cdp.as_ref(), page, self.ready_timeout, DEFAULT_READY_POLL)
            .await
        {
            Ok(()) => {}
            // Chat apps keep long-lived connections open; the composer may
            // render well before the load event.
            Err(err) if err.kind == AdapterErrorKind::NavTimeout => {
                warn!(page = %page, url, "Chat tab still loading, continuing: {}", err)
            }
            Err(err) => return Err(err.into()),
        }
        let surface: Arc<dyn ChatSurface> = Arc::new(CdpChatSurface::new(self.cdp.clone(), page));
        Ok(surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::ElementRole;
    use cdp_adapter::AdapterError;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Replies to scripts by content: readiness never completes, locate
    /// finds nothing.
    #[derive(Default)]
    struct SlowPage {
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Cdp for SlowPage {
        async fn open_page(&self, url: &str) -> Result<PageId, AdapterError> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(PageId::new())
        }
        async fn active_page(&self) -> Result<PageId, AdapterError> {
            Ok(PageId::new())
        }
        async fn evaluate(&self, _page: PageId, expression: &str) -> Result<Value, AdapterError> {
            if expression == "document.readyState" {
                Ok(json!("loading"))
            } else {
                Ok(json!({ "matches": [] }))
            }
        }
        async fn insert_text(&self, _page: PageId, _text: &str) -> Result<(), AdapterError> {
            Ok(())
        }
        async fn press_key(&self, _page: PageId, _key: KeyPress) -> Result<(), AdapterError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tab_still_yields_a_surface() {
        let cdp = Arc::new(SlowPage::default());
        let opener = CdpSurfaceOpener::new(cdp.clone(), Duration::from_secs(2));
        let surface = opener.open("https://gemini.google.com/app").await.unwrap();
        assert_eq!(
            cdp.opened.lock().unwrap().clone(),
            vec!["https://gemini.google.com/app".to_string()]
        );

        let chain = SelectorChain::new(ElementRole::SendButton, ["button.send"]);
        let found = surface
            .wait_for(&chain, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
