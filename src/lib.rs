//! # lnvisor
//!
//! **lnvisor** controls Lightning daemons for integration harnesses: one
//! [`HarnessNode`] per process, from launch through wallet unlock to a clean stop.
//!
//! It launches and watches the process, brings the RPC connection up in stages that
//! tolerate the daemon's own slow startup, and answers "wait until channel X is
//! open/closed" from the daemon's channel-graph subscription without missing events
//! that already happened.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌──────────────────────────────┐
//!                         │         HarnessNode          │
//!                         │  (one generation at a time)  │
//!                         └──┬───────────┬────────────┬──┘
//!                            ▼           ▼            ▼
//!                  ┌──────────────┐ ┌──────────────┐ ┌──────────────────────┐
//!                  │   Launcher   │ │ Bootstrapper │ │   topology watcher   │
//!                  │ ProcessHandle│ │ connect      │ │ ingest ─► Coordinator│
//!                  │ ExitSignal   │ │ gate 1 / 2   │ │ (single owner of     │
//!                  │ pid, stderr  │ │ identity     │ │  edges/closed/waiters│
//!                  └──────┬───────┘ │ probe        │ └──────────┬───────────┘
//!                         │         └──────┬───────┘            │
//!                         │                │ Poller             │
//!                         ▼                ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                       Bus (broadcast, per-bus seq)                        │
//! └─────────────────────────────────────┬─────────────────────────────────────┘
//!                                       ▼
//!                              SubscriberSet::attach
//!                          ┌────────────┼────────────┐
//!                          ▼            ▼            ▼
//!                      LogWriter     custom        ...
//! ```
//!
//! ### Lifecycle
//! ```text
//! NotStarted ──start──► WaitingToStart ──gate 1──┬──► Unlocking ──init/unlock──┐
//!                                                │                            ▼
//!                                                └──────────► gate 2, identity, probe
//!                                                                             │
//!                                              watcher running ◄── ServerActive
//!
//! stop: StopDaemon → wait exit → cancel token → join tasks (grace) → NotStarted
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Node**          | Launch, bring up, wait on, and stop one daemon.               | [`HarnessNode`], [`NodeBuilder`], [`NodeIds`] |
//! | **Process**       | Spawn, pid file, exit signal, stderr tail.                    | [`Launcher`], [`ProcessHandle`], [`ExitReport`] |
//! | **Bring-up**      | Staged connection with two lifecycle gates.                   | [`Bootstrapper`], [`ConnectionState`]       |
//! | **Watcher**       | Channel open/close waits against the graph subscription.      | [`WatcherHandle`], [`Direction`]            |
//! | **Polling**       | Bounded "until it holds" loops.                               | [`Poller`], [`Pacing`], [`Timeout`]         |
//! | **RPC**           | Client traits, tonic transport, credentials.                  | [`rpc::ClientSet`], [`rpc::Dialer`]         |
//! | **Subscriber API**| Observe lifecycle events.                                     | [`Subscribe`], [`Event`], [`EventKind`]     |
//! | **Configuration** | Paths, flags, ports, timeouts.                                | [`NodeConfig`], [`Timeouts`], [`NodePorts`] |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lnvisor::{ListenProbe, Network, NodeBuilder, NodeConfig, NodeIds, NodePorts, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ids = NodeIds::new();
//!     let ports = NodePorts::allocate(&ListenProbe::default())?;
//!     let cfg = NodeConfig::in_temp_dir("alice", Network::Regtest, ports)?;
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(lnvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let alice = NodeBuilder::new(cfg, ids.next()).with_subscribers(subs).build();
//!     alice.start("/usr/local/bin/lnd", true).await?;
//!     println!("{} is up as {:?}", alice.label(), alice.pub_key());
//!
//!     alice.wait_for_blockchain_sync(Duration::from_secs(30)).await?;
//!     alice.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod bootstrap;
mod config;
mod error;
mod events;
mod node;
mod ports;
mod process;
pub mod rpc;
mod subscribers;
mod wait;
mod watcher;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use bootstrap::{Bootstrapper, ConnectionState, Credential, Readiness, Ready};
pub use config::{DEFAULT_CSV, Network, NodeConfig, TRICKLE_DELAY_MS, Timeouts};
pub use error::{BootstrapError, Gate, LaunchError, NodeError, RpcError, WatchError};
pub use events::{Bus, Event, EventKind};
pub use node::{HarnessNode, NodeBuilder, NodeId, NodeIds, TaskGroup};
pub use ports::{DEFAULT_BASE_PORT, ListenProbe, NodePorts, PortAllocator, PortsExhausted};
pub use process::{ExitReport, ExitSignal, Launcher, ProcessHandle, record_pid};
pub use subscribers::{Subscribe, SubscriberSet};
pub use wait::{Pacing, Poller, Timeout};
pub use watcher::{
    Direction, OutpointError, TopologyUpdate, WatcherHandle, WatcherOptions, channel_point, decode_channel_point,
    decode_update,
};

// Optional: expose the built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
