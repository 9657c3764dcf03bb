//! # Watch coordinator: the single owner of topology state.
//!
//! ```text
//! ingestion task ──► [updates queue] ──┐
//!                                      ├──► Coordinator::run (select!, one at a time)
//! WatcherHandle  ──► [request queue] ──┘          │
//!                                                 ├─ edges:  OutPoint → directions seen (≤ 2)
//!                                                 ├─ closed: OutPoint set
//!                                                 └─ waiters: open / close, per OutPoint
//! ```
//!
//! ## Rules
//! - Open resolves once both directed edges were observed, or the graph snapshot already
//!   lists the channel at request time.
//! - Close resolves once the outpoint is in the closed set.
//! - An update and a request for the same outpoint never race: both are handled on this
//!   task, so a waiter is either resolved on registration or by the next matching update.
//! - Cancellation stops the loop; pending waiters are dropped unresolved.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bitcoin::OutPoint;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::outpoint::TopologyUpdate;
use super::request::{Direction, WatchRequest};
use crate::events::{Bus, Event, EventKind};
use crate::rpc::{LightningApi, proto};

/// Directed edges needed before a channel counts as open.
const EDGES_PER_CHANNEL: u8 = 2;

pub(crate) struct Coordinator {
    label: Arc<str>,
    bus: Bus,
    lightning: Arc<dyn LightningApi>,
    snapshot_timeout: Duration,

    edges: HashMap<OutPoint, u8>,
    closed: HashSet<OutPoint>,
    open_waiters: HashMap<OutPoint, Vec<oneshot::Sender<()>>>,
    close_waiters: HashMap<OutPoint, Vec<oneshot::Sender<()>>>,
}

impl Coordinator {
    pub(crate) fn new(label: Arc<str>, bus: Bus, lightning: Arc<dyn LightningApi>, snapshot_timeout: Duration) -> Self {
        Self {
            label,
            bus,
            lightning,
            snapshot_timeout,
            edges: HashMap::new(),
            closed: HashSet::new(),
            open_waiters: HashMap::new(),
            close_waiters: HashMap::new(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut updates: mpsc::Receiver<TopologyUpdate>,
        mut requests: mpsc::Receiver<WatchRequest>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,

                Some(update) = updates.recv() => self.apply_update(update),

                Some(req) = requests.recv() => {
                    if !self.handle_request(req, &token).await {
                        break;
                    }
                }
            }
        }
    }

    /// Folds one update into the state and releases any waiters it satisfies.
    pub(crate) fn apply_update(&mut self, update: TopologyUpdate) {
        for op in update.announced {
            let seen = self.edges.entry(op).or_insert(0);
            *seen = (*seen + 1).min(EDGES_PER_CHANNEL);
            if *seen < EDGES_PER_CHANNEL {
                continue;
            }
            if let Some(waiters) = self.open_waiters.remove(&op) {
                self.resolve(op, Direction::Open, waiters);
            }
        }
        for op in update.closed {
            self.closed.insert(op);
            if let Some(waiters) = self.close_waiters.remove(&op) {
                self.resolve(op, Direction::Close, waiters);
            }
        }
    }

    /// Resolves or registers a request. Returns `false` if cancelled mid-way.
    pub(crate) async fn handle_request(&mut self, req: WatchRequest, token: &CancellationToken) -> bool {
        let WatchRequest {
            outpoint,
            direction,
            signal,
        } = req;

        let satisfied = match direction {
            Direction::Open => {
                if self.edge_count(&outpoint) >= EDGES_PER_CHANNEL {
                    true
                } else {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return false,
                        found = self.graph_contains(&outpoint) => found,
                    }
                }
            }
            Direction::Close => self.closed.contains(&outpoint),
        };

        if satisfied {
            self.resolve(outpoint, direction, vec![signal]);
            return true;
        }

        let waiters = match direction {
            Direction::Open => self.open_waiters.entry(outpoint).or_default(),
            Direction::Close => self.close_waiters.entry(outpoint).or_default(),
        };
        waiters.retain(|w| !w.is_closed());
        waiters.push(signal);
        self.bus.publish(
            Event::new(EventKind::WatchRegistered)
                .with_node(self.label.clone())
                .with_watch(outpoint, direction),
        );
        true
    }

    pub(crate) fn edge_count(&self, outpoint: &OutPoint) -> u8 {
        self.edges.get(outpoint).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self, outpoint: &OutPoint, direction: Direction) -> usize {
        let map = match direction {
            Direction::Open => &self.open_waiters,
            Direction::Close => &self.close_waiters,
        };
        map.get(outpoint).map_or(0, Vec::len)
    }

    /// Whether the current graph already lists the channel. Failures count as "not yet".
    async fn graph_contains(&self, outpoint: &OutPoint) -> bool {
        let req = proto::ChannelGraphRequest {
            include_unannounced: false,
        };
        let graph = match tokio::time::timeout(self.snapshot_timeout, self.lightning.describe_graph(req)).await {
            Ok(Ok(graph)) => graph,
            Ok(Err(err)) => {
                tracing::debug!(target: "lnvisor::watcher", node = %self.label, error = %err, "graph snapshot failed");
                return false;
            }
            Err(_) => {
                tracing::debug!(target: "lnvisor::watcher", node = %self.label, "graph snapshot timed out");
                return false;
            }
        };
        graph
            .edges
            .iter()
            .filter_map(|edge| OutPoint::from_str(&edge.chan_point).ok())
            .any(|op| op == *outpoint)
    }

    fn resolve(&self, outpoint: OutPoint, direction: Direction, waiters: Vec<oneshot::Sender<()>>) {
        let mut released = 0u32;
        for waiter in waiters {
            if waiter.send(()).is_ok() {
                released += 1;
            }
        }
        self.bus.publish(
            Event::new(EventKind::WatchResolved)
                .with_node(self.label.clone())
                .with_watch(outpoint, direction)
                .with_attempt(released),
        );
    }
}
