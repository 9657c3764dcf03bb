//! Controller events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast` with a per-bus sequence counter
//!
//! ## Quick reference
//! - **Publishers**: process waiter (started/exited/killed), `Bootstrapper`
//!   (state changes, clients, identity), watcher tasks, `HarnessNode::stop`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener spawned by `NodeBuilder::with_subscribers`, and any
//!   caller holding `Bus::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
