use std::sync::Arc;

use action_locator::{ElementLocator, LocatedElement, LocatorError, SelectorChain};
use async_trait::async_trait;
use cdp_adapter::{Cdp, PageId};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{ApplyAck, FillStrategy};
use crate::ports::FillPort;
use crate::script;

/// [`FillPort`] over a live page.
pub struct CdpFillPort {
    cdp: Arc<dyn Cdp>,
    locator: Arc<dyn ElementLocator>,
    page: PageId,
    chain: SelectorChain,
}

impl CdpFillPort {
    pub fn new(
        cdp: Arc<dyn Cdp>,
        locator: Arc<dyn ElementLocator>,
        page: PageId,
        chain: SelectorChain,
    ) -> Self {
        Self {
            cdp,
            locator,
            page,
            chain,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

fn parse_ack(value: Value) -> Result<ApplyAck, LocatorError> {
    let response: AckResponse = serde_json::from_value(value)
        .map_err(|err| LocatorError::Internal(format!("bad fill response: {}", err)))?;
    Ok(match response.status.as_str() {
        "ok" => ApplyAck::Applied,
        "stale" => ApplyAck::Stale,
        _ => ApplyAck::Declined(
            response
                .reason
                .unwrap_or_else(|| format!("status {}", response.status)),
        ),
    })
}

#[async_trait]
impl FillPort for CdpFillPort {
    async fn locate(&self) -> Result<Option<LocatedElement>, LocatorError> {
        self.locator.locate(self.page, &self.chain).await
    }

    async fn apply(
        &self,
        element: &LocatedElement,
        strategy: FillStrategy,
        text: &str,
    ) -> Result<ApplyAck, LocatorError> {
        let expression = script::fill_script(strategy, &element.handle, text);
        let ack = parse_ack(self.cdp.evaluate(element.page, &expression).await?)?;
        if strategy == FillStrategy::CdpInsertText && ack == ApplyAck::Applied {
            self.cdp.insert_text(element.page, text).await?;
        }
        Ok(ack)
    }

    async fn read_back(&self, element: &LocatedElement) -> Result<Option<String>, LocatorError> {
        self.locator.read_text(element).await
    }
}
