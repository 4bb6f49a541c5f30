use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::SettingsError;
use crate::model::{Settings, Template};

/// JSON-file backed settings. Every read-modify-write runs under one lock.
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored keys merged over the defaults, normalised, and written back.
    pub async fn load(&self) -> Result<Settings, SettingsError> {
        let _guard = self.lock.lock().await;
        self.load_locked().await
    }

    /// Shallow-merge `patch` (a JSON object) into the settings.
    pub async fn save(&self, patch: Value) -> Result<Settings, SettingsError> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(SettingsError::InvalidPatch(format!(
                    "expected an object, got {}",
                    other
                )))
            }
        };
        let _guard = self.lock.lock().await;
        let current = self.load_locked().await?;
        let mut merged = self.to_map(&current)?;
        for (key, value) in patch {
            merged.insert(key, value);
        }
        let mut next: Settings = serde_json::from_value(Value::Object(merged))
            .map_err(|err| SettingsError::InvalidPatch(err.to_string()))?;
        next.normalize();
        self.write(&next).await?;
        Ok(next)
    }

    /// Typed variant of [`SettingsStore::save`].
    pub async fn update<F>(&self, apply: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut settings = self.load_locked().await?;
        apply(&mut settings);
        settings.normalize();
        self.write(&settings).await?;
        Ok(settings)
    }

    /// Replace the template with the same id, appending it at the end.
    pub async fn upsert_template(&self, template: Template) -> Result<Settings, SettingsError> {
        debug!(id = %template.id, "Upserting template");
        self.update(move |settings| {
            settings.templates.retain(|t| t.id != template.id);
            settings.templates.push(template);
        })
        .await
    }

    pub async fn remove_template(&self, id: &str) -> Result<Settings, SettingsError> {
        debug!(id, "Removing template");
        self.update(|settings| settings.templates.retain(|t| t.id != id))
            .await
    }

    pub async fn reset(&self) -> Result<Settings, SettingsError> {
        let _guard = self.lock.lock().await;
        let mut settings = Settings::default();
        settings.normalize();
        self.write(&settings).await?;
        info!(path = %self.path.display(), "Settings reset to defaults");
        Ok(settings)
    }

    async fn load_locked(&self) -> Result<Settings, SettingsError> {
        let stored = self.read_stored().await?;
        let mut merged = self.to_map(&Settings::default())?;
        for (key, value) in stored {
            merged.insert(key, value);
        }
        let mut settings: Settings =
            serde_json::from_value(Value::Object(merged)).map_err(|source| {
                SettingsError::Corrupt {
                    path: self.path.clone(),
                    source,
                }
            })?;
        settings.normalize();
        self.write(&settings).await?;
        Ok(settings)
    }

    async fn read_stored(&self) -> Result<Map<String, Value>, SettingsError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings file yet");
                return Ok(Map::new());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&raw).map_err(|source| SettingsError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(SettingsError::Corrupt {
                path: self.path.clone(),
                source: serde::de::Error::custom("top level is not an object"),
            }),
        }
    }

    fn to_map(&self, settings: &Settings) -> Result<Map<String, Value>, SettingsError> {
        match serde_json::to_value(settings) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Ok(Map::new()),
            Err(source) => Err(SettingsError::Corrupt {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write(&self, settings: &Settings) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(settings).map_err(|source| {
            SettingsError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await.map_err(io_err)?;
        fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
