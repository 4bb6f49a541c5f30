//! Element locator for third-party chat UIs
//!
//! The pages we drive are owned by someone else and change without notice.
//! This crate finds elements by:
//! - trying an ordered chain of CSS selector candidates
//! - descending into every open shadow root
//! - tagging matches with a handle attribute so later scripts can find them again
//! - ranking matches by candidate order, visibility and enablement

pub mod errors;
pub mod locator;
pub mod script;
pub mod types;

pub use errors::*;
pub use locator::*;
pub use types::*;
