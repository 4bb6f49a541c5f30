//! Error types for locator system

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Element not found with any candidate
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A handle no longer points at a live element (page re-rendered)
    #[error("Stale element handle: {0}")]
    StaleHandle(String),

    /// Selector chain is unusable
    #[error("Invalid selector chain: {0}")]
    InvalidChain(String),

    /// CDP communication error
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Waiting for an element ran out of time
    #[error("Locate timeout: {0}")]
    Timeout(String),

    /// Page script returned something unexpected
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LocatorError::Timeout(_) | LocatorError::CdpError(_) | LocatorError::StaleHandle(_)
        )
    }
}

impl From<AdapterError> for LocatorError {
    fn from(err: AdapterError) -> Self {
        match err.kind {
            AdapterErrorKind::NavTimeout => LocatorError::Timeout(err.to_string()),
            _ => LocatorError::CdpError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_errors_map_to_locator_errors() {
        let err: LocatorError = AdapterError::io("socket closed").into();
        assert!(matches!(err, LocatorError::CdpError(_)));
        assert!(err.is_retryable());

        let err: LocatorError = AdapterError::new(AdapterErrorKind::NavTimeout).into();
        assert!(matches!(err, LocatorError::Timeout(_)));
    }

    #[test]
    fn invalid_chain_is_final() {
        assert!(!LocatorError::InvalidChain("empty".into()).is_retryable());
    }
}
