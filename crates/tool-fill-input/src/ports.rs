use action_locator::{LocatedElement, LocatorError};
use async_trait::async_trait;

use crate::model::{ApplyAck, FillStrategy};

/// The page-facing half of a fill. One port is bound to one input on one
/// page.
#[async_trait]
pub trait FillPort: Send + Sync {
    /// Resolve the input afresh.
    async fn locate(&self) -> Result<Option<LocatedElement>, LocatorError>;

    async fn apply(
        &self,
        element: &LocatedElement,
        strategy: FillStrategy,
        text: &str,
    ) -> Result<ApplyAck, LocatorError>;

    /// Current content; `None` when the handle went stale.
    async fn read_back(&self, element: &LocatedElement) -> Result<Option<String>, LocatorError>;
}
