use std::sync::Arc;
use std::time::Duration;

use action_locator::{LocatedElement, SelectorChain};
use async_trait::async_trait;
use cdp_adapter::{KeyPress, PageId};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tool_fill_input::{FillPolicy, FillReport};

use crate::errors::TargetError;

/// Poll interval of the default [`ChatSurface::wait_for`].
pub const SURFACE_POLL: Duration = Duration::from_millis(250);

/// One opened chat tab.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    fn page(&self) -> PageId;

    async fn find(&self, chain: &SelectorChain) -> Result<Option<LocatedElement>, TargetError>;

    /// Element whose label matches `text`
    async fn find_text(
        &self,
        chain: &SelectorChain,
        text: &str,
    ) -> Result<Option<LocatedElement>, TargetError>;

    async fn list_texts(&self, chain: &SelectorChain) -> Result<Vec<String>, TargetError>;

    /// `false` when the element went stale or is disabled
    async fn click(&self, element: &LocatedElement) -> Result<bool, TargetError>;

    async fn press_key(&self, key: KeyPress) -> Result<(), TargetError>;

    /// Verified fill of the element the chain resolves to
    async fn fill(
        &self,
        chain: &SelectorChain,
        text: &str,
        policy: &FillPolicy,
        cancel: &CancellationToken,
    ) -> Result<FillReport, TargetError>;

    /// Current text of the element the chain resolves to; `None` if absent
    async fn read_text(&self, chain: &SelectorChain) -> Result<Option<String>, TargetError>;

    /// Poll [`ChatSurface::find`] until it matches. `None` on timeout.
    async fn wait_for(
        &self,
        chain: &SelectorChain,
        timeout: Duration,
    ) -> Result<Option<LocatedElement>, TargetError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find(chain).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(err) if err.is_retryable() => {}
                Err(err) => return Err(err),
            }
            if Instant::now() + SURFACE_POLL > deadline {
                return Ok(None);
            }
            sleep(SURFACE_POLL).await;
        }
    }
}

/// Opens a chat URL in a fresh tab and waits for it to load.
#[async_trait]
pub trait SurfaceOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn ChatSurface>, TargetError>;
}
