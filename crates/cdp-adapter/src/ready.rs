use std::time::Duration;

use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::{AdapterError, AdapterErrorKind, Cdp, PageId};

/// Poll interval used while waiting for a freshly opened tab.
pub const DEFAULT_READY_POLL: Duration = Duration::from_millis(300);

const READY_STATE_SCRIPT: &str = "document.readyState";

/// Wait until the page reports `document.readyState === "complete"`.
///
/// A page that disappeared while waiting counts as ready; callers find out
/// soon enough when they try to use it.
pub async fn wait_document_ready(
    cdp: &dyn Cdp,
    page: PageId,
    timeout: Duration,
    poll: Duration,
) -> Result<(), AdapterError> {
    let deadline = Instant::now() + timeout;
    loop {
        match cdp.evaluate(page, READY_STATE_SCRIPT).await {
            Ok(Value::String(state)) if state == "complete" => return Ok(()),
            Ok(other) => debug!(page = %page, state = %other, "Page not ready yet"),
            Err(err) if err.kind == AdapterErrorKind::TargetNotFound => return Ok(()),
            // Evaluation fails while the document is being swapped during navigation.
            Err(err) => debug!(page = %page, "readyState probe failed: {}", err),
        }

        if Instant::now() + poll > deadline {
            return Err(AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(format!(
                "page {} not ready after {}ms",
                page,
                timeout.as_millis()
            )));
        }
        sleep(poll).await;
    }
}
