//! Element resolution over selector chains

use crate::{errors::LocatorError, script, types::*};
use async_trait::async_trait;
use cdp_adapter::{Cdp, PageId};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Element locator trait
///
/// Implementors provide the three page round-trips; chain walking, label
/// matching and polling are shared.
#[async_trait]
pub trait ElementLocator: Send + Sync {
    /// Every match of every candidate, in candidate then document order
    async fn locate_all(
        &self,
        page: PageId,
        chain: &SelectorChain,
    ) -> Result<Vec<ElementMatch>, LocatorError>;

    /// Click a located element. `false` when stale or disabled.
    async fn click(&self, element: &LocatedElement) -> Result<bool, LocatorError>;

    /// Current text of a located element. `None` when stale.
    async fn read_text(&self, element: &LocatedElement) -> Result<Option<String>, LocatorError>;

    /// Best element for the chain, if any
    async fn locate(
        &self,
        page: PageId,
        chain: &SelectorChain,
    ) -> Result<Option<LocatedElement>, LocatorError> {
        chain.validate()?;
        let matches = self.locate_all(page, chain).await?;
        let chosen = select_match(&matches);
        match chosen {
            Some(m) => debug!(
                role = %chain.role,
                selector = %m.selector,
                candidate = m.candidate,
                shadow_depth = m.shadow_depth,
                visible = m.visible,
                "Located element"
            ),
            None => debug!(role = %chain.role, "No candidate matched"),
        }
        Ok(chosen.map(|m| LocatedElement::from_match(page, chain.role, m)))
    }

    /// First element across the chain whose label matches `text`
    async fn locate_by_text(
        &self,
        page: PageId,
        chain: &SelectorChain,
        text: &str,
    ) -> Result<Option<LocatedElement>, LocatorError> {
        chain.validate()?;
        let matches = self.locate_all(page, chain).await?;
        let hit = matches
            .iter()
            .filter(|m| m.matches_label(text))
            .min_by_key(|m| !m.visible)
            .map(|m| LocatedElement::from_match(page, chain.role, m));
        Ok(hit)
    }

    /// Distinct visible labels, in order of appearance
    async fn list_texts(
        &self,
        page: PageId,
        chain: &SelectorChain,
    ) -> Result<Vec<String>, LocatorError> {
        chain.validate()?;
        let matches = self.locate_all(page, chain).await?;
        let mut seen = Vec::<String>::new();
        for m in matches.iter().filter(|m| m.visible) {
            let label = m.text.lines().next().unwrap_or("").trim().to_string();
            if !label.is_empty() && !seen.contains(&label) {
                seen.push(label);
            }
        }
        Ok(seen)
    }

    /// Poll [`ElementLocator::locate`] until something matches
    async fn wait_for(
        &self,
        page: PageId,
        chain: &SelectorChain,
        opts: LocateOptions,
    ) -> Result<LocatedElement, LocatorError> {
        let deadline = Instant::now() + opts.timeout;
        loop {
            match self.locate(page, chain).await {
                Ok(Some(found)) => return Ok(found),
                Ok(None) => {}
                Err(err) if err.is_retryable() => {
                    debug!(role = %chain.role, "locate attempt failed: {}", err)
                }
                Err(err) => return Err(err),
            }
            if Instant::now() + opts.poll > deadline {
                return Err(LocatorError::Timeout(format!(
                    "{} not found within {}ms",
                    chain.role,
                    opts.timeout.as_millis()
                )));
            }
            sleep(opts.poll).await;
        }
    }
}

/// Pick the match to act on.
///
/// Candidate order dominates: the earliest candidate with a visible, enabled
/// match wins. Failing that, the earliest visible match, then the earliest
/// match at all (some editors keep their real input visually hidden).
pub fn select_match(matches: &[ElementMatch]) -> Option<&ElementMatch> {
    let mut ordered: Vec<&ElementMatch> = matches.iter().collect();
    ordered.sort_by_key(|m| m.candidate);

    ordered
        .iter()
        .find(|m| m.is_ready())
        .or_else(|| ordered.iter().find(|m| m.visible))
        .or_else(|| ordered.first())
        .copied()
}

#[derive(Debug, Deserialize)]
struct LocateResponse {
    #[serde(default)]
    matches: Vec<ElementMatch>,
    #[serde(default)]
    invalid: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct HandleResponse {
    status: String,
    #[serde(default)]
    text: Option<String>,
}

/// Locator that runs the page scripts through a [`Cdp`] connection.
pub struct ScriptLocator {
    cdp: Arc<dyn Cdp>,
}

impl ScriptLocator {
    pub fn new(cdp: Arc<dyn Cdp>) -> Self {
        Self { cdp }
    }

    pub fn cdp(&self) -> &Arc<dyn Cdp> {
        &self.cdp
    }

    async fn eval_handle(
        &self,
        page: PageId,
        expression: &str,
    ) -> Result<HandleResponse, LocatorError> {
        let value = self.cdp.evaluate(page, expression).await?;
        serde_json::from_value(value)
            .map_err(|err| LocatorError::Internal(format!("bad handle response: {}", err)))
    }
}

/// Decode a locate script result, logging selectors the browser rejected.
pub fn parse_locate_response(
    chain: &SelectorChain,
    value: Value,
) -> Result<Vec<ElementMatch>, LocatorError> {
    let response: LocateResponse = serde_json::from_value(value)
        .map_err(|err| LocatorError::Internal(format!("bad locate response: {}", err)))?;
    for idx in &response.invalid {
        if let Some(selector) = chain.candidates.get(*idx) {
            warn!(role = %chain.role, selector = %selector, "Browser rejected selector");
        }
    }
    Ok(response.matches)
}

#[async_trait]
impl ElementLocator for ScriptLocator {
    async fn locate_all(
        &self,
        page: PageId,
        chain: &SelectorChain,
    ) -> Result<Vec<ElementMatch>, LocatorError> {
        let token = format!("cr{}", Uuid::new_v4().simple());
        let expression = script::locate_script(&chain.candidates, &token);
        let value = self.cdp.evaluate(page, &expression).await?;
        parse_locate_response(chain, value)
    }

    async fn click(&self, element: &LocatedElement) -> Result<bool, LocatorError> {
        let response = self
            .eval_handle(element.page, &script::click_script(&element.handle))
            .await?;
        match response.status.as_str() {
            "ok" => {
                info!(role = %element.role, selector = %element.selector, "Clicked element");
                Ok(true)
            }
            other => {
                debug!(role = %element.role, status = %other, "Click skipped");
                Ok(false)
            }
        }
    }

    async fn read_text(&self, element: &LocatedElement) -> Result<Option<String>, LocatorError> {
        let response = self
            .eval_handle(element.page, &script::read_script(&element.handle))
            .await?;
        match response.status.as_str() {
            "ok" => Ok(Some(response.text.unwrap_or_default())),
            _ => Ok(None),
        }
    }
}
