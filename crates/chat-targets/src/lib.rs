//! The two chat UIs we relay into.
//!
//! [`ChatTarget`] holds the hardcoded heuristics for each UI (URLs and
//! selector chains). The flows in [`model_select`] and [`send`] only talk to
//! a [`ChatSurface`], so they run the same against a live tab or a scripted
//! one.

pub mod errors;
pub mod model_select;
pub mod notify;
pub mod send;
pub mod surface;
pub mod target;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use errors::TargetError;
pub use model_select::{select_model, ModelSelectOptions, ModelSelection};
pub use notify::{CollectingNotifier, Notification, Notifier, TracingNotifier};
pub use send::{auto_send, SendAttempt, SendPolicy};
pub use surface::{ChatSurface, SurfaceOpener, SURFACE_POLL};
pub use target::{ChatTarget, TargetKind};
