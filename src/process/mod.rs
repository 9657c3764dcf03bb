//! Child-process supervision.
//!
//! - [`Launcher`] spawns a daemon and records its pid.
//! - [`ProcessHandle`] kills it and exposes its [`ExitSignal`].
//! - [`ExitReport`] describes how it ended, including the stderr tail.

mod log_sink;
mod supervisor;

pub use supervisor::{ExitReport, ExitSignal, Launcher, ProcessHandle, record_pid};
