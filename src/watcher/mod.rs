//! # Topology watcher.
//!
//! Resolves "wait until channel X is open / closed" against the daemon's channel-graph
//! subscription. Two tasks per node:
//!
//! ```text
//!   SubscribeChannelGraph ──► ingest ──(decode, skip bad items)──► [updates]
//!                                                                      │
//!   WatcherHandle::watch ─────────────────────────────────────► [requests]
//!                                                                      ▼
//!                                                               Coordinator
//! ```
//!
//! [`spawn`] subscribes before returning, so a handle only exists once updates are
//! flowing. Both tasks stop on the node's cancellation token; a stream error or
//! end-of-stream stops ingestion only, and the coordinator keeps answering from the
//! state it already has.

mod coordinator;
mod outpoint;
mod request;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::RpcError;
use crate::events::{Bus, Event, EventKind};
use crate::node::TaskGroup;
use crate::rpc::{LightningApi, RpcStream, proto};

pub(crate) use coordinator::Coordinator;
pub use outpoint::{OutpointError, TopologyUpdate, channel_point, decode_channel_point, decode_update};
pub use request::{Direction, WatcherHandle};

/// Sizing and deadlines for one watcher.
#[derive(Clone, Copy, Debug)]
pub struct WatcherOptions {
    /// Capacity of the update and request queues (clamped to at least 1).
    pub capacity: usize,
    /// Bound on the graph snapshot taken for each open request.
    pub snapshot_timeout: Duration,
}

/// Subscribes to topology updates and starts the ingestion and coordinator tasks.
pub async fn spawn(
    label: Arc<str>,
    bus: Bus,
    lightning: Arc<dyn LightningApi>,
    opts: WatcherOptions,
    tasks: &mut TaskGroup,
    token: CancellationToken,
) -> Result<WatcherHandle, RpcError> {
    let stream = lightning.subscribe_channel_graph().await?;

    let capacity = opts.capacity.max(1);
    let (update_tx, update_rx) = mpsc::channel(capacity);
    let (request_tx, request_rx) = mpsc::channel(capacity);

    tasks.spawn(
        "topology-ingest",
        ingest(stream, update_tx, label.clone(), bus.clone(), token.clone()),
    );
    let coordinator = Coordinator::new(label.clone(), bus.clone(), lightning, opts.snapshot_timeout);
    tasks.spawn("watch-coordinator", coordinator.run(update_rx, request_rx, token));

    bus.publish(Event::new(EventKind::TopologySubscribed).with_node(label));
    Ok(WatcherHandle::new(request_tx))
}

async fn ingest(
    mut stream: RpcStream<proto::GraphTopologyUpdate>,
    tx: mpsc::Sender<TopologyUpdate>,
    label: Arc<str>,
    bus: Bus,
    token: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = token.cancelled() => return,
            item = stream.next() => item,
        };
        let update = match item {
            Some(Ok(update)) => update,
            Some(Err(err)) => {
                tracing::debug!(target: "lnvisor::watcher", node = %label, error = %err, "topology stream failed");
                return;
            }
            None => {
                tracing::debug!(target: "lnvisor::watcher", node = %label, "topology stream ended");
                return;
            }
        };

        let (decoded, skipped) = decode_update(&update);
        for err in skipped {
            bus.publish(
                Event::new(EventKind::UpdateSkipped)
                    .with_node(label.clone())
                    .with_reason(err.to_string()),
            );
        }
        if decoded.is_empty() {
            continue;
        }
        tokio::select! {
            _ = token.cancelled() => return,
            sent = tx.send(decoded) => if sent.is_err() { return },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::testing::{FakeNode, edge_update, close_update, outpoint};
    use std::str::FromStr;

    fn opts() -> WatcherOptions {
        WatcherOptions {
            capacity: 16,
            snapshot_timeout: Duration::from_millis(200),
        }
    }

    async fn start(node: &Arc<FakeNode>) -> (WatcherHandle, TaskGroup, CancellationToken) {
        let mut tasks = TaskGroup::new();
        let token = CancellationToken::new();
        let handle = spawn(
            "w(0)".into(),
            Bus::new(64),
            node.clone(),
            opts(),
            &mut tasks,
            token.clone(),
        )
        .await
        .unwrap();
        (handle, tasks, token)
    }

    #[tokio::test]
    async fn test_open_resolves_after_second_edge() {
        let node = FakeNode::new();
        let (handle, _tasks, _token) = start(&node).await;
        let op = outpoint(1);

        let rx = handle.watch(op, Direction::Open).await.unwrap();
        node.push_update(edge_update(&[op]));

        // One edge is not enough.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut rx = rx;
        assert!(rx.try_recv().is_err());

        node.push_update(edge_update(&[op]));
        tokio::time::timeout(Duration::from_secs(2), rx).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_open_resolves_from_graph_snapshot() {
        let node = FakeNode::new();
        let op = outpoint(2);
        node.set_graph(&[op]);
        let (handle, _tasks, _token) = start(&node).await;

        handle
            .wait(op, Direction::Open, Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_before_request_resolves_immediately() {
        let node = FakeNode::new();
        let (handle, _tasks, _token) = start(&node).await;
        let op = outpoint(3);

        node.push_update(close_update(&[op]));
        // The update is queued ahead of the request only once ingestion forwarded it.
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle
            .wait(op, Direction::Close, Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_waiters_all_resolve() {
        let node = FakeNode::new();
        let (handle, _tasks, _token) = start(&node).await;
        let op = outpoint(4);

        let a = handle.watch(op, Direction::Close).await.unwrap();
        let b = handle.watch(op, Direction::Close).await.unwrap();
        node.push_update(close_update(&[op]));

        tokio::time::timeout(Duration::from_secs(2), a).await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(2), b).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_items_are_skipped() {
        let node = FakeNode::new();
        let (handle, _tasks, _token) = start(&node).await;
        let op = outpoint(5);

        let mut update = edge_update(&[op, op]);
        update.channel_updates.insert(
            1,
            proto::ChannelEdgeUpdate {
                chan_point: Some(proto::ChannelPoint {
                    output_index: 0,
                    funding_txid: Some(proto::channel_point::FundingTxid::FundingTxidBytes(vec![7; 5])),
                }),
                ..Default::default()
            },
        );
        node.push_update(update);

        handle
            .wait(op, Direction::Open, Duration::from_secs(2))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_abandons_pending_requests() {
        let node = FakeNode::new();
        let (handle, mut tasks, token) = start(&node).await;
        let op = outpoint(6);

        let rx = handle.watch(op, Direction::Open).await.unwrap();
        token.cancel();
        tasks.join_within(Duration::from_secs(2)).await.unwrap();

        assert!(rx.await.is_err());
        assert!(matches!(
            handle.wait(op, Direction::Open, Duration::from_millis(100)).await,
            Err(WatchError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_wait_dropped_on_shutdown_returns_before_deadline() {
        let node = FakeNode::new();
        let (handle, mut tasks, token) = start(&node).await;

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        };
        let started = tokio::time::Instant::now();
        let (res, ()) = tokio::join!(handle.wait(outpoint(8), Direction::Close, Duration::from_secs(5)), canceller);

        assert!(matches!(res, Err(WatchError::Abandoned { .. })), "{res:?}");
        assert!(started.elapsed() < Duration::from_secs(1));
        tasks.join_within(Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_caller_deadline_is_a_timeout() {
        let node = FakeNode::new();
        let (handle, _tasks, _token) = start(&node).await;
        let op = bitcoin::OutPoint::from_str(
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b:9",
        )
        .unwrap();

        let err = handle
            .wait(op, Direction::Close, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::Timeout { direction: Direction::Close, .. }));
    }

    #[tokio::test]
    async fn test_subscription_failure_propagates() {
        let node = FakeNode::new();
        node.fail_topology_subscribe(RpcError::from(tonic::Status::unimplemented("no graph")));
        let mut tasks = TaskGroup::new();
        let err = spawn(
            "w(1)".into(),
            Bus::new(8),
            node.clone(),
            opts(),
            &mut tasks,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RpcError::Status { .. }));
        assert!(tasks.is_empty());
    }
}
