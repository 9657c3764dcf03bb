//! Lifecycle gates: read the daemon's state stream until a condition holds.
//!
//! A stream error or end-of-stream before the condition is a protocol failure, not a
//! timeout. Each gate opens its own subscription.

use std::time::Duration;

use futures::StreamExt;

use crate::error::{BootstrapError, Gate, RpcError};
use crate::rpc::StateApi;
use crate::rpc::proto::WalletState;

/// Blocks until the daemon reports anything but `WAITING_TO_START`.
pub(crate) async fn wait_until_started(state: &dyn StateApi, timeout: Duration) -> Result<WalletState, BootstrapError> {
    wait_for_state(state, Gate::Started, timeout, |s| s != WalletState::WaitingToStart).await
}

/// Blocks until the daemon reports `SERVER_ACTIVE`.
pub(crate) async fn wait_until_server_active(state: &dyn StateApi, timeout: Duration) -> Result<WalletState, BootstrapError> {
    wait_for_state(state, Gate::ServerActive, timeout, |s| s == WalletState::ServerActive).await
}

async fn wait_for_state<P>(state: &dyn StateApi, gate: Gate, timeout: Duration, done: P) -> Result<WalletState, BootstrapError>
where
    P: Fn(WalletState) -> bool,
{
    let protocol = |source: RpcError| BootstrapError::Protocol { gate, source };

    let read = async {
        let mut stream = state.subscribe_state().await.map_err(protocol)?;
        while let Some(item) = stream.next().await {
            let resp = item.map_err(protocol)?;
            let Some(current) = WalletState::from_wire(resp.state) else {
                return Err(protocol(RpcError::Malformed(format!(
                    "unknown wallet state {}",
                    resp.state
                ))));
            };
            if done(current) {
                return Ok(current);
            }
        }
        Err(protocol(RpcError::StreamClosed))
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| BootstrapError::Timeout {
            gate,
            timeout,
            last_error: None,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNode, StreamEnd};

    #[tokio::test]
    async fn test_started_gate_skips_waiting_states() {
        let node = FakeNode::new();
        node.script_states(
            &[
                WalletState::WaitingToStart,
                WalletState::WaitingToStart,
                WalletState::Locked,
            ],
            StreamEnd::Hang,
        );
        let state = wait_until_started(node.as_ref(), Duration::from_secs(1)).await.unwrap();
        assert_eq!(state, WalletState::Locked);
    }

    #[tokio::test]
    async fn test_stream_end_is_protocol_error() {
        let node = FakeNode::new();
        node.script_states(&[WalletState::WaitingToStart], StreamEnd::Close);
        let err = wait_until_started(node.as_ref(), Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Protocol {
                gate: Gate::Started,
                source: RpcError::StreamClosed
            }
        ));
    }

    #[tokio::test]
    async fn test_stream_error_is_protocol_error() {
        let node = FakeNode::new();
        node.script_states(
            &[WalletState::RpcActive],
            StreamEnd::Fail(RpcError::from(tonic::Status::internal("state service died"))),
        );
        let err = wait_until_server_active(node.as_ref(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "bootstrap_protocol");
        assert_eq!(err.gate(), Gate::ServerActive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_is_timeout() {
        let node = FakeNode::new();
        node.script_states(&[WalletState::WaitingToStart], StreamEnd::Hang);
        let err = wait_until_started(node.as_ref(), Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Timeout { gate: Gate::Started, .. }));
    }
}
