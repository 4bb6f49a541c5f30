//! Error handling for the relay application

use cdp_adapter::AdapterError;
use chat_targets::TargetError;
use message_compose::ComposeError;
use settings_store::SettingsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("browser: {0}")]
    Browser(#[from] AdapterError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("page capture failed: {0}")]
    Capture(String),
}
