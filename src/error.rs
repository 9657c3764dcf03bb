//! Error types used by the node controller.
//!
//! Each layer owns one enum:
//!
//! - [`LaunchError`]: starting the child process and recording its pid.
//! - [`RpcError`]: a single RPC call, dial or stream read.
//! - [`BootstrapError`]: the staged connection bring-up.
//! - [`WatchError`]: waiting on the topology watcher.
//! - [`NodeError`]: what [`HarnessNode`](crate::HarnessNode) returns; carries the node
//!   label and the operation name next to the underlying cause.
//!
//! All of them provide `as_label()` (stable snake_case for logs/metrics).

use std::path::PathBuf;
use std::time::Duration;

use bitcoin::OutPoint;
use thiserror::Error;

use crate::watcher::{Direction, OutpointError};

/// # Errors produced while launching a node process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The executable could not be spawned.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The spawned child reported no pid (it was reaped before we could read it).
    #[error("spawned {program:?} but no pid is available")]
    NoPid { program: PathBuf },

    /// The log file could not be opened for appending.
    #[error("failed to open log file {path:?}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pid file could not be written; the process has been killed.
    #[error("failed to record pid at {path:?}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::Spawn { .. } => "launch_spawn",
            LaunchError::NoPid { .. } => "launch_no_pid",
            LaunchError::LogFile { .. } => "launch_log_file",
            LaunchError::PidFile { .. } => "launch_pid_file",
        }
    }
}

/// # Errors produced by a single RPC interaction.
///
/// [`RpcError::is_transient`] separates connectivity noise (endpoint not listening yet,
/// credential file not written yet) from protocol failures that must not be retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    /// Endpoint refused or dropped the connection.
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// A credential file (TLS certificate, macaroon) is missing or only partially written.
    #[error("credential not ready: {0}")]
    CredentialPending(String),

    /// Server answered with a non-OK status.
    #[error("rpc failed with {code:?}: {message}")]
    Status { code: tonic::Code, message: String },

    /// A server stream ended where more items were expected.
    #[error("stream closed by server")]
    StreamClosed,

    /// Response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Call did not complete in time.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl RpcError {
    /// True for errors that are expected while the daemon is still coming up.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Unavailable(_) | RpcError::CredentialPending(_) => true,
            RpcError::Status { code, .. } => *code == tonic::Code::Unavailable,
            _ => false,
        }
    }

    /// True when the daemon rejected a call because chain recovery is still running.
    pub fn is_recovery_in_progress(&self) -> bool {
        match self {
            RpcError::Status { message, .. } => message.contains("recovery in progress"),
            _ => false,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RpcError::Unavailable(_) => "rpc_unavailable",
            RpcError::CredentialPending(_) => "rpc_credential_pending",
            RpcError::Status { .. } => "rpc_status",
            RpcError::StreamClosed => "rpc_stream_closed",
            RpcError::Malformed(_) => "rpc_malformed",
            RpcError::DeadlineExceeded(_) => "rpc_deadline_exceeded",
        }
    }
}

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        RpcError::Status {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Stage of the connection bring-up an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Dialing the RPC endpoint.
    Connect,
    /// Waiting for the daemon to leave `WAITING_TO_START`.
    Started,
    /// Waiting for the daemon to report `SERVER_ACTIVE`.
    ServerActive,
    /// Fetching the node identity.
    Identity,
    /// Probing the topology subscription.
    TopologyProbe,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Connect => "connect",
            Gate::Started => "started",
            Gate::ServerActive => "server_active",
            Gate::Identity => "identity",
            Gate::TopologyProbe => "topology_probe",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// # Errors produced by the staged connection bring-up.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// A gate did not pass before its deadline.
    #[error("{gate} gate not passed within {timeout:?}{}", last_error_suffix(.last_error))]
    Timeout {
        gate: Gate,
        timeout: Duration,
        /// Last transient error observed while retrying, if any.
        last_error: Option<RpcError>,
    },

    /// A non-transient failure; never retried.
    #[error("{gate} gate failed: {source}")]
    Protocol {
        gate: Gate,
        #[source]
        source: RpcError,
    },

    /// The node was shut down while bring-up was in progress.
    #[error("bring-up cancelled during {gate} gate")]
    Cancelled { gate: Gate },
}

fn last_error_suffix(last: &Option<RpcError>) -> String {
    match last {
        Some(err) => format!("; last error: {err}"),
        None => String::new(),
    }
}

impl BootstrapError {
    /// The gate the error refers to.
    pub fn gate(&self) -> Gate {
        match self {
            BootstrapError::Timeout { gate, .. }
            | BootstrapError::Protocol { gate, .. }
            | BootstrapError::Cancelled { gate } => *gate,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BootstrapError::Timeout { .. } => "bootstrap_timeout",
            BootstrapError::Protocol { .. } => "bootstrap_protocol",
            BootstrapError::Cancelled { .. } => "bootstrap_cancelled",
        }
    }
}

/// # Errors produced while waiting on the topology watcher.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watcher is not accepting requests (never started, or shut down).
    #[error("topology watcher is not running")]
    Stopped,

    /// The request was dropped without resolution (watcher torn down while it was pending).
    #[error("watch on {outpoint} abandoned before it resolved")]
    Abandoned { outpoint: OutPoint },

    /// Caller-side deadline elapsed first.
    #[error("channel {outpoint} not {direction} within {timeout:?}")]
    Timeout {
        outpoint: OutPoint,
        direction: Direction,
        timeout: Duration,
    },
}

impl WatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WatchError::Stopped => "watch_stopped",
            WatchError::Abandoned { .. } => "watch_abandoned",
            WatchError::Timeout { .. } => "watch_timeout",
        }
    }
}

/// # Errors returned by node operations.
///
/// Every variant names the node (`name(id)`) and the operation that failed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{node}: {op}: {source}")]
    Launch {
        node: String,
        op: &'static str,
        #[source]
        source: LaunchError,
    },

    #[error("{node}: {op}: {source}")]
    Bootstrap {
        node: String,
        op: &'static str,
        #[source]
        source: BootstrapError,
    },

    #[error("{node}: {op}: {source}")]
    Rpc {
        node: String,
        op: &'static str,
        #[source]
        source: RpcError,
    },

    #[error("{node}: {op}: {source}")]
    Watch {
        node: String,
        op: &'static str,
        #[source]
        source: WatchError,
    },

    #[error("{node}: {op}: invalid channel point: {source}")]
    ChannelPoint {
        node: String,
        op: &'static str,
        #[source]
        source: OutpointError,
    },

    #[error("{node}: {op}: {source}")]
    Io {
        node: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The operation needs a component (process, clients, watcher) that is not up.
    #[error("{node}: {op}: {what} not available")]
    NotReady {
        node: String,
        op: &'static str,
        what: &'static str,
    },

    /// `start` was called on a node that is already running.
    #[error("{node}: {op}: already running")]
    AlreadyRunning { node: String, op: &'static str },

    /// The node was stopped while the operation was in flight.
    #[error("{node}: {op}: interrupted by stop")]
    Interrupted { node: String, op: &'static str },

    /// The process exited while the operation was waiting on it.
    #[error("{node}: {op}: process exited ({status})")]
    ProcessExited {
        node: String,
        op: &'static str,
        status: String,
    },

    /// The process did not exit after being asked to stop; it has been killed.
    #[error("{node}: {op}: process did not exit within {timeout:?}")]
    ProcessDidNotExit {
        node: String,
        op: &'static str,
        timeout: Duration,
    },

    /// A polled condition was not met before the deadline.
    #[error("{node}: {op}: not reached within {timeout:?}: {detail}")]
    Convergence {
        node: String,
        op: &'static str,
        timeout: Duration,
        detail: String,
    },

    /// Teardown grace period was exceeded; the listed tasks were aborted.
    #[error("{node}: shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        node: String,
        grace: Duration,
        stuck: Vec<String>,
    },
}

impl NodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            NodeError::Launch { source, .. } => source.as_label(),
            NodeError::Bootstrap { source, .. } => source.as_label(),
            NodeError::Rpc { source, .. } => source.as_label(),
            NodeError::Watch { source, .. } => source.as_label(),
            NodeError::ChannelPoint { .. } => "node_channel_point",
            NodeError::Io { .. } => "node_io",
            NodeError::NotReady { .. } => "node_not_ready",
            NodeError::AlreadyRunning { .. } => "node_already_running",
            NodeError::Interrupted { .. } => "node_interrupted",
            NodeError::ProcessExited { .. } => "node_process_exited",
            NodeError::ProcessDidNotExit { .. } => "node_process_did_not_exit",
            NodeError::Convergence { .. } => "node_convergence",
            NodeError::GraceExceeded { .. } => "node_grace_exceeded",
        }
    }

    /// True when a topology wait ended unresolved: its deadline passed, or the watcher
    /// dropped it on shutdown first.
    pub fn is_watch_timeout(&self) -> bool {
        matches!(
            self,
            NodeError::Watch {
                source: WatchError::Timeout { .. } | WatchError::Abandoned { .. },
                ..
            }
        )
    }
}
