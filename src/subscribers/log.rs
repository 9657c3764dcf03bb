//! # LogWriter - renders controller events through `tracing`
//!
//! Process lifecycle and teardown problems go out at `info`/`warn`, bring-up and
//! watcher chatter at `debug`. Install any `tracing` subscriber to see them.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO lnvisor: process started node=alice(0) pid=4242
//! DEBUG lnvisor: connection state changed node=alice(0) state="server_active"
//! DEBUG lnvisor: watch resolved node=alice(0) outpoint=9f..:0 direction=open waiters=1
//! WARN lnvisor: process exited node=alice(0) pid=4242 reason="exit status: 1"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let node = e.node.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ProcessStarted => {
                info!(target: "lnvisor", seq = e.seq, node, pid = ?e.pid, "process started");
            }
            EventKind::ProcessExited => {
                warn!(target: "lnvisor", seq = e.seq, node, pid = ?e.pid, reason, "process exited");
            }
            EventKind::ProcessKilled => {
                info!(target: "lnvisor", seq = e.seq, node, pid = ?e.pid, "process killed");
            }
            EventKind::StateChanged => {
                debug!(target: "lnvisor", seq = e.seq, node, state = ?e.state, "connection state changed");
            }
            EventKind::ConnectRetry => {
                debug!(target: "lnvisor", seq = e.seq, node, attempt = ?e.attempt, reason, "connect retry");
            }
            EventKind::ClientsReady => {
                debug!(target: "lnvisor", seq = e.seq, node, kind = reason, "rpc clients ready");
            }
            EventKind::IdentityResolved => {
                info!(target: "lnvisor", seq = e.seq, node, pubkey = reason, "identity resolved");
            }
            EventKind::TopologySubscribed => {
                debug!(target: "lnvisor", seq = e.seq, node, "topology subscribed");
            }
            EventKind::UpdateSkipped => {
                warn!(target: "lnvisor", seq = e.seq, node, reason, "topology item skipped");
            }
            EventKind::WatchRegistered => {
                debug!(
                    target: "lnvisor",
                    seq = e.seq,
                    node,
                    outpoint = ?e.outpoint,
                    direction = ?e.direction,
                    "watch registered"
                );
            }
            EventKind::WatchResolved => {
                debug!(
                    target: "lnvisor",
                    seq = e.seq,
                    node,
                    outpoint = ?e.outpoint,
                    direction = ?e.direction,
                    waiters = ?e.attempt,
                    "watch resolved"
                );
            }
            EventKind::ShutdownRequested => {
                info!(target: "lnvisor", seq = e.seq, node, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!(target: "lnvisor", seq = e.seq, node, "all tasks stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!(target: "lnvisor", seq = e.seq, node, grace_ms = ?e.timeout_ms, stuck = reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "lnvisor", seq = e.seq, subscriber = node, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "lnvisor", seq = e.seq, subscriber = node, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_events_render_through_tracing() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("lnvisor=info"))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let log = LogWriter::new();
        log.on_event(
            &Event::new(EventKind::ProcessExited)
                .with_node("alice(0)")
                .with_pid(42)
                .with_reason("exit status: 1"),
        )
        .await;
        log.on_event(&Event::new(EventKind::TopologySubscribed).with_node("alice(0)"))
            .await;

        let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("process exited"));
        assert!(out.contains("alice(0)"));
        assert!(out.contains("exit status: 1"));
        assert!(!out.contains("topology subscribed"));
    }
}
