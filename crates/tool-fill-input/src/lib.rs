//! Verified text entry into framework-managed inputs.
//!
//! Chat composers are React textareas, ProseMirror or Quill editors, often
//! inside shadow roots. None of them reliably accept a plain `value`
//! assignment, so [`fill_verified`] walks a chain of [`FillStrategy`]s per
//! element kind and reads the element back after each one, comparing against
//! a [`Fingerprint`] of the intended text. The whole cycle is retried with a
//! fixed delay, re-locating the element each time.

pub mod errors;
pub mod fingerprint;
pub mod model;
pub mod policy;
pub mod ports;
pub mod script;

mod cdp_port;
mod redact;
mod runner;

pub use cdp_port::CdpFillPort;
pub use errors::FillError;
pub use fingerprint::{Fingerprint, Verification};
pub use model::{ApplyAck, AttemptResult, FillOutcome, FillReport, FillStrategy, StrategyAttempt};
pub use policy::FillPolicy;
pub use ports::FillPort;
pub use runner::fill_verified;
