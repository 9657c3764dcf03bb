//! Watch requests and the caller-side handle.

use std::fmt;
use std::time::Duration;

use bitcoin::OutPoint;
use tokio::sync::{mpsc, oneshot};

use crate::error::WatchError;

/// Which event a caller waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Both directed edges of the channel are in the graph.
    Open,
    /// The channel was reported closed.
    Close,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Open => "open",
            Direction::Close => "closed",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending wait, resolved at most once through its signal.
#[derive(Debug)]
pub(crate) struct WatchRequest {
    pub(crate) outpoint: OutPoint,
    pub(crate) direction: Direction,
    pub(crate) signal: oneshot::Sender<()>,
}

impl WatchRequest {
    pub(crate) fn new(outpoint: OutPoint, direction: Direction) -> (Self, oneshot::Receiver<()>) {
        let (signal, rx) = oneshot::channel();
        (
            Self {
                outpoint,
                direction,
                signal,
            },
            rx,
        )
    }
}

/// Submits watch requests to a running watcher.
#[derive(Clone, Debug)]
pub struct WatcherHandle {
    tx: mpsc::Sender<WatchRequest>,
}

impl WatcherHandle {
    pub(crate) fn new(tx: mpsc::Sender<WatchRequest>) -> Self {
        Self { tx }
    }

    /// Queues a request; the receiver fires when it resolves.
    pub async fn watch(&self, outpoint: OutPoint, direction: Direction) -> Result<oneshot::Receiver<()>, WatchError> {
        let (req, rx) = WatchRequest::new(outpoint, direction);
        self.tx.send(req).await.map_err(|_| WatchError::Stopped)?;
        Ok(rx)
    }

    /// Queues a request and waits for it, giving up after `timeout`.
    ///
    /// Either way the wait did not resolve:
    /// - [`WatchError::Timeout`] when the deadline passed;
    /// - [`WatchError::Abandoned`] as soon as the watcher drops the request on shutdown,
    ///   without sitting out the rest of the deadline.
    ///
    /// [`NodeError::is_watch_timeout`](crate::NodeError::is_watch_timeout) is true for both.
    pub async fn wait(&self, outpoint: OutPoint, direction: Direction, timeout: Duration) -> Result<(), WatchError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let rx = tokio::time::timeout_at(deadline, self.watch(outpoint, direction))
            .await
            .map_err(|_| WatchError::Timeout {
                outpoint,
                direction,
                timeout,
            })??;
        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(WatchError::Abandoned { outpoint }),
            Err(_) => Err(WatchError::Timeout {
                outpoint,
                direction,
                timeout,
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
