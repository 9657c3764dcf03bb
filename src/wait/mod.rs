//! Polling until a condition holds.
//!
//! - [`Poller`] samples an operation at a [`Pacing`] until it converges or a deadline passes.
//! - [`Timeout`] is what a poller returns on failure: elapsed time plus the last value and
//!   last error it saw.

mod pacing;
mod poller;

pub use pacing::Pacing;
pub use poller::{Poller, Timeout};
