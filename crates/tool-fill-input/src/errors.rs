use action_locator::LocatorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FillError {
    #[error("text exceeds max length ({0} chars)")]
    TextTooLong(usize),
    #[error("fill cancelled")]
    Cancelled,
    #[error("locator failed: {0}")]
    Locator(#[from] LocatorError),
}
