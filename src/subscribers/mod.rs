//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point; [`SubscriberSet`] fans bus events out to
//! a list of subscribers, each on its own bounded queue and worker.
//!
//! ## Architecture
//! ```text
//! process waiter / bootstrapper / watcher ── publish(Event) ──► Bus
//!                                                                │
//!                                              SubscriberSet::attach (listener)
//!                                                                │
//!                                                   ┌────────────┼──────────┐
//!                                                   ▼            ▼          ▼
//!                                               LogWriter     Custom       ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
