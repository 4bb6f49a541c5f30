use action_locator::LocatorError;
use cdp_adapter::AdapterError;
use thiserror::Error;
use tool_fill_input::FillError;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error(transparent)]
    Fill(#[from] FillError),
    #[error("browser: {0}")]
    Adapter(#[from] AdapterError),
}

impl TargetError {
    /// Transient page trouble worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TargetError::Locator(err) => err.is_retryable(),
            TargetError::Adapter(err) => err.retriable,
            _ => false,
        }
    }
}
