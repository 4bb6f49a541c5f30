//! chatrelay library
//!
//! Exposes the relay pieces for the binary and for integration testing

pub mod capture;
pub mod config;
pub mod errors;
pub mod relay;
pub mod surface;

pub use capture::{capture_active_page, capture_page, PageCapture};
pub use config::{AppConfig, RelayTimeouts};
pub use errors::RelayError;
pub use relay::{resolve_prompt, Relay, SendOutcome, SendRequest, SendStatus};
pub use surface::{CdpChatSurface, CdpSurfaceOpener};
