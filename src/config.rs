//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then the YAML file
//! (`--config` or `<config dir>/chatrelay/config.yaml`), then `CHATRELAY_*`
//! environment variables with `__` as the nesting separator
//! (`CHATRELAY_BROWSER__HEADLESS=true`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use cdp_adapter::CdpConfig;
use chat_targets::ModelSelectOptions;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::RelayError;

/// Timing knobs for one relay run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayTimeouts {
    /// Upper bound on waiting for the chat tab's document to load
    pub page_ready_ms: u64,
    pub model_picker_ms: u64,
    pub model_menu_ms: u64,
    /// Pause between a fill strategy and its read-back
    pub fill_settle_ms: u64,
    /// Pause between clicking send and checking the composer
    pub send_settle_ms: u64,
}

impl Default for RelayTimeouts {
    fn default() -> Self {
        Self {
            page_ready_ms: 30_000,
            model_picker_ms: 8_000,
            model_menu_ms: 3_000,
            fill_settle_ms: 150,
            send_settle_ms: 400,
        }
    }
}

impl RelayTimeouts {
    pub fn page_ready(&self) -> Duration {
        Duration::from_millis(self.page_ready_ms)
    }

    pub fn model_select(&self) -> ModelSelectOptions {
        ModelSelectOptions {
            picker_timeout: Duration::from_millis(self.model_picker_ms),
            menu_timeout: Duration::from_millis(self.model_menu_ms),
        }
    }

    pub fn send_settle(&self) -> Duration {
        Duration::from_millis(self.send_settle_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: CdpConfig,
    /// Where relay settings and templates live
    pub settings_path: PathBuf,
    pub timeouts: RelayTimeouts,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: CdpConfig::default(),
            settings_path: config_dir().join("settings.json"),
            timeouts: RelayTimeouts::default(),
        }
    }
}

/// `<platform config dir>/chatrelay`, or `./.chatrelay` when there is none.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("chatrelay"))
        .unwrap_or_else(|| PathBuf::from(".chatrelay"))
}

pub fn default_config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

impl AppConfig {
    /// Load the layered configuration. An explicit file must exist; the
    /// default one is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, RelayError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_file(), false),
        };
        debug!(path = %path.display(), required, "Loading configuration");

        let settings = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(
                File::from(path.as_path())
                    .format(FileFormat::Yaml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix("CHATRELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        if path.exists() {
            info!("Loaded configuration from: {}", path.display());
        }
        Ok(config)
    }
}
