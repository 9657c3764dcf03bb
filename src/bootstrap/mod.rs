//! Staged connection bring-up.
//!
//! - [`Bootstrapper`] runs connect → gate 1 → (unlock) → gate 2 → identity → probe.
//! - [`ConnectionState`] records how far a node got.
//! - `gates` holds the two lifecycle gates on the state stream.

mod bootstrapper;
mod gates;
mod state;

pub use bootstrapper::{Bootstrapper, Credential, Readiness, Ready};
pub use state::ConnectionState;
