//! # Controller events emitted by the supervisor, bootstrapper and watcher.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Process events**: child process lifecycle (started, exited, killed)
//! - **Connection events**: bring-up progress (state changes, clients, identity)
//! - **Watcher events**: topology subscription and watch resolution
//! - **Shutdown/subscriber events**: teardown outcome and fan-out health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, node label,
//! pid, channel outpoint and reasons.
//!
//! ## Ordering guarantees
//! Each event gets a sequence number (`seq`) from the [`Bus`](super::Bus) it is published
//! on. Sequence numbers increase monotonically per bus, so two harnesses sharing a process
//! never interleave counters.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lnvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProcessExited)
//!     .with_node("alice(0)")
//!     .with_pid(4242)
//!     .with_reason("exit status: 1");
//!
//! assert_eq!(ev.kind, EventKind::ProcessExited);
//! assert_eq!(ev.node.as_deref(), Some("alice(0)"));
//! assert_eq!(ev.pid, Some(4242));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bitcoin::OutPoint;

use crate::watcher::Direction;

/// Classification of controller events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `node`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `node`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Process events ===
    /// Child process spawned and its pid recorded.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `pid`: operating-system process id
    ProcessStarted,

    /// Child process exited (on its own or after a kill).
    ///
    /// Sets:
    /// - `node`: node label
    /// - `pid`: process id
    /// - `reason`: exit status, plus the last stderr line when the exit was unsuccessful
    ProcessExited,

    /// Forced termination was requested.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `pid`: process id
    ProcessKilled,

    // === Connection events ===
    /// Connection state advanced.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `state`: new state name
    StateChanged,

    /// A dial or credential read failed transiently and will be retried.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `attempt`: attempt number (1-based)
    /// - `reason`: transient error
    ConnectRetry,

    /// RPC clients were constructed.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `reason`: "restricted" or "full"
    ClientsReady,

    /// Node identity public key resolved.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `reason`: hex public key
    IdentityResolved,

    // === Watcher events ===
    /// Topology subscription established; the watcher is accepting requests.
    ///
    /// Sets:
    /// - `node`: node label
    TopologySubscribed,

    /// A malformed item inside a topology update was skipped.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `reason`: decoding error
    UpdateSkipped,

    /// A watch request was registered as pending.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `outpoint`, `direction`
    WatchRegistered,

    /// Waiters on an outpoint were resolved.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `outpoint`, `direction`
    /// - `attempt`: number of waiters released
    WatchResolved,

    // === Shutdown events ===
    /// Stop requested for a node.
    ///
    /// Sets:
    /// - `node`: node label
    ShutdownRequested,

    /// All node tasks stopped within the configured grace period.
    ///
    /// Sets:
    /// - `node`: node label
    AllStoppedWithin,

    /// Grace period exceeded; remaining tasks were aborted.
    ///
    /// Sets:
    /// - `node`: node label
    /// - `timeout_ms`: grace period
    GraceExceeded,
}

/// Controller event with optional metadata.
///
/// - `seq`: per-bus monotonic sequence, stamped by [`Bus::publish`](super::Bus::publish)
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Per-bus sequence number; zero until published.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Node label (`name(id)`) or subscriber name.
    pub node: Option<Arc<str>>,
    /// Process id, for process events.
    pub pid: Option<u32>,
    /// Connection state name, for `StateChanged`.
    pub state: Option<&'static str>,
    /// Channel funding outpoint, for watcher events.
    pub outpoint: Option<OutPoint>,
    /// Watch direction, for watcher events.
    pub direction: Option<Direction>,
    /// Attempt or count.
    pub attempt: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, exit status, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            node: None,
            pid: None,
            state: None,
            outpoint: None,
            direction: None,
            attempt: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_node(mut self, node: impl Into<Arc<str>>) -> Self {
        self.node = Some(node.into());
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_state(mut self, state: &'static str) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches the channel outpoint and watch direction.
    #[inline]
    pub fn with_watch(mut self, outpoint: OutPoint, direction: Direction) -> Self {
        self.outpoint = Some(outpoint);
        self.direction = Some(direction);
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_node(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_node(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
