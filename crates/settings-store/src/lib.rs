//! Relay settings persisted as one flat JSON object.
//!
//! Keys use the same camelCase names as the browser extension's storage, so
//! an exported `chrome.storage.local` dump loads as-is. Unknown keys are kept.

pub mod errors;
pub mod model;
pub mod store;

pub use errors::SettingsError;
pub use model::{ExtractionMode, ModelAvailabilityMode, Settings, Template, DEFAULT_ALLOWED_MODELS};
pub use store::SettingsStore;
