//! # Node configuration.
//!
//! Provides [`NodeConfig`] (per-node layout, ports and daemon flags) and [`Timeouts`]
//! (every deadline and interval the controller uses).
//!
//! ## Directory layout
//! ```text
//! <base_dir>/
//!   data/
//!     tls.cert, tls.key
//!     chain/bitcoin/<network>/admin.macaroon, readonly.macaroon, invoice.macaroon
//!     graph/<network>/channel.db
//!   log/
//!   <node_id>.pid
//! ```
//!
//! ## Sentinel values
//! - `log_file = None` → stdout/stderr are not persisted; stderr still goes to `tracing`
//! - `fee_url = None` → no `--feeurl` flag

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ports::NodePorts;

/// Default CSV delay passed as `--bitcoin.defaultremotedelay`.
pub const DEFAULT_CSV: u16 = 4;

/// Gossip trickle delay in milliseconds.
pub const TRICKLE_DELAY_MS: u32 = 50;

/// Bitcoin network the daemon runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Simnet,
    Regtest,
    Testnet,
}

impl Network {
    /// Directory name the daemon uses for this network.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Simnet => "simnet",
            Network::Regtest => "regtest",
            Network::Testnet => "testnet",
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            Network::Simnet => "--bitcoin.simnet",
            Network::Regtest => "--bitcoin.regtest",
            Network::Testnet => "--bitcoin.testnet",
        }
    }
}

/// Deadlines and intervals used by one node.
///
/// ## Field semantics
/// - `default`: budget for connect + first gate, identity, topology probe, unary calls
///   and convergence waits; stop waits up to twice this for process exit
/// - `node_start`: budget for the second lifecycle gate (`SERVER_ACTIVE`)
/// - `poll_interval`: pacing of every retry/poll loop
/// - `sync_poll_interval`: pacing of the chain-sync wait
/// - `topology_probe`: how long a probe subscription may stay silent before it counts as healthy
/// - `stop_grace`: how long teardown waits for background tasks after cancelling them
#[derive(Clone, Debug)]
pub struct Timeouts {
    pub default: Duration,
    pub node_start: Duration,
    pub poll_interval: Duration,
    pub sync_poll_interval: Duration,
    pub topology_probe: Duration,
    pub stop_grace: Duration,
}

impl Timeouts {
    /// How long `stop` waits for the process to exit before killing it.
    #[inline]
    pub fn process_exit(&self) -> Duration {
        self.default.saturating_mul(2)
    }
}

impl Default for Timeouts {
    /// - `default = 30s`
    /// - `node_start = 3min`
    /// - `poll_interval = 20ms`
    /// - `sync_poll_interval = 100ms`
    /// - `topology_probe = 1s`
    /// - `stop_grace = 10s`
    fn default() -> Self {
        Self {
            default: Duration::from_secs(30),
            node_start: Duration::from_secs(180),
            poll_interval: Duration::from_millis(20),
            sync_poll_interval: Duration::from_millis(100),
            topology_probe: Duration::from_secs(1),
            stop_grace: Duration::from_secs(10),
        }
    }
}

/// Configuration for one managed node.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Human-readable name; combined with the node id into the label `name(id)`.
    pub name: String,
    pub network: Network,
    /// Root of the node's private directory tree.
    pub base_dir: PathBuf,
    /// Chain-backend flags inserted after the network flag.
    pub backend_args: Vec<String>,
    /// Extra daemon flags appended after the generated ones.
    pub extra_args: Vec<String>,
    /// The wallet is initialised with a seed; bring-up stops at the unlocker.
    pub has_seed: bool,
    pub ports: NodePorts,
    pub accept_keysend: bool,
    pub accept_amp: bool,
    pub fee_url: Option<String>,
    /// Append-only file receiving the daemon's stdout/stderr.
    pub log_file: Option<PathBuf>,
    /// Stderr lines kept for the exit report.
    pub stderr_tail: usize,
    pub timeouts: Timeouts,
    /// Capacity of the node's event bus (clamped to at least 1).
    pub bus_capacity: usize,
    /// Capacity of the watcher's request and update queues (clamped to at least 1).
    pub request_capacity: usize,
}

impl NodeConfig {
    /// Builds a config rooted at `base_dir` with harness defaults (keysend on).
    pub fn new(name: impl Into<String>, network: Network, base_dir: impl Into<PathBuf>, ports: NodePorts) -> Self {
        Self {
            name: name.into(),
            network,
            base_dir: base_dir.into(),
            backend_args: Vec::new(),
            extra_args: Vec::new(),
            has_seed: false,
            ports,
            accept_keysend: true,
            accept_amp: false,
            fee_url: None,
            log_file: None,
            stderr_tail: 64,
            timeouts: Timeouts::default(),
            bus_capacity: 1024,
            request_capacity: 64,
        }
    }

    /// Same as [`NodeConfig::new`] but rooted at a fresh temporary directory that
    /// outlives this value; `HarnessNode::cleanup` removes it.
    pub fn in_temp_dir(name: impl Into<String>, network: Network, ports: NodePorts) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("lnvisor-node").tempdir()?;
        #[allow(deprecated)]
        let base = dir.into_path();
        Ok(Self::new(name, network, base, ports))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join("log")
    }

    pub fn tls_cert_path(&self) -> PathBuf {
        self.data_dir().join("tls.cert")
    }

    pub fn tls_key_path(&self) -> PathBuf {
        self.data_dir().join("tls.key")
    }

    /// `data/chain/bitcoin/<network>`, where the macaroons live.
    pub fn network_dir(&self) -> PathBuf {
        self.data_dir()
            .join("chain")
            .join("bitcoin")
            .join(self.network.name())
    }

    pub fn admin_macaroon_path(&self) -> PathBuf {
        self.network_dir().join("admin.macaroon")
    }

    pub fn readonly_macaroon_path(&self) -> PathBuf {
        self.network_dir().join("readonly.macaroon")
    }

    pub fn invoice_macaroon_path(&self) -> PathBuf {
        self.network_dir().join("invoice.macaroon")
    }

    /// Holding directory of the graph database.
    pub fn db_dir(&self) -> PathBuf {
        self.data_dir().join("graph").join(self.network.name())
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir().join("channel.db")
    }

    pub fn chan_backup_path(&self) -> PathBuf {
        self.network_dir().join("channel.backup")
    }

    pub fn pid_file(&self, node_id: u64) -> PathBuf {
        self.base_dir.join(format!("{node_id}.pid"))
    }

    pub fn p2p_addr(&self) -> String {
        listener(self.ports.p2p)
    }

    pub fn rpc_addr(&self) -> String {
        listener(self.ports.rpc)
    }

    pub fn rest_addr(&self) -> String {
        listener(self.ports.rest)
    }

    /// Daemon command line for this configuration.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.network.flag().to_string()];
        args.extend(self.backend_args.iter().cloned());
        args.extend(
            [
                "--bitcoin.active",
                "--nobootstrap",
                "--debuglevel=debug",
                "--bitcoin.defaultchanconfs=1",
                "--db.batch-commit-interval=10ms",
            ]
            .map(String::from),
        );
        args.push(format!("--bitcoin.defaultremotedelay={DEFAULT_CSV}"));
        args.push(format!("--rpclisten={}", self.rpc_addr()));
        args.push(format!("--restlisten={}", self.rest_addr()));
        args.push(format!("--restcors=https://{}", self.rest_addr()));
        args.push(format!("--listen={}", self.p2p_addr()));
        args.push(format!("--externalip={}", self.p2p_addr()));
        args.push(path_flag("--logdir", &self.log_dir()));
        args.push(path_flag("--datadir", &self.data_dir()));
        args.push(path_flag("--tlscertpath", &self.tls_cert_path()));
        args.push(path_flag("--tlskeypath", &self.tls_key_path()));
        args.push(path_flag("--configfile", &self.data_dir()));
        args.push(path_flag("--adminmacaroonpath", &self.admin_macaroon_path()));
        args.push(path_flag("--readonlymacaroonpath", &self.readonly_macaroon_path()));
        args.push(path_flag("--invoicemacaroonpath", &self.invoice_macaroon_path()));
        args.push(format!("--trickledelay={TRICKLE_DELAY_MS}"));
        args.push(format!("--profile={}", self.ports.profile));

        if !self.has_seed {
            args.push("--noseedbackup".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        if self.accept_keysend {
            args.push("--accept-keysend".to_string());
        }
        if self.accept_amp {
            args.push("--accept-amp".to_string());
        }
        if let Some(url) = &self.fee_url {
            args.push(format!("--feeurl={url}"));
        }
        args
    }
}

fn listener(port: u16) -> String {
    format!("127.0.0.1:{port}")
}

fn path_flag(flag: &str, path: &Path) -> String {
    format!("{flag}={}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> NodePorts {
        NodePorts {
            p2p: 10001,
            rpc: 10002,
            rest: 10003,
            profile: 10004,
        }
    }

    #[test]
    fn test_layout_follows_network() {
        let cfg = NodeConfig::new("alice", Network::Regtest, "/tmp/alice", ports());
        assert_eq!(cfg.tls_cert_path(), PathBuf::from("/tmp/alice/data/tls.cert"));
        assert_eq!(
            cfg.admin_macaroon_path(),
            PathBuf::from("/tmp/alice/data/chain/bitcoin/regtest/admin.macaroon")
        );
        assert_eq!(
            cfg.db_path(),
            PathBuf::from("/tmp/alice/data/graph/regtest/channel.db")
        );
        assert_eq!(cfg.pid_file(3), PathBuf::from("/tmp/alice/3.pid"));
    }

    #[test]
    fn test_args_order_and_flags() {
        let mut cfg = NodeConfig::new("bob", Network::Simnet, "/n", ports());
        cfg.backend_args = vec!["--bitcoin.node=btcd".into()];
        cfg.extra_args = vec!["--protocol.wumbo-channels".into()];
        cfg.fee_url = Some("http://127.0.0.1:9000/fees".into());

        let args = cfg.args();
        assert_eq!(args[0], "--bitcoin.simnet");
        assert_eq!(args[1], "--bitcoin.node=btcd");
        assert!(args.contains(&"--rpclisten=127.0.0.1:10002".to_string()));
        assert!(args.contains(&"--restcors=https://127.0.0.1:10003".to_string()));
        assert!(args.contains(&"--profile=10004".to_string()));
        assert!(args.contains(&"--trickledelay=50".to_string()));
        assert!(args.contains(&"--noseedbackup".to_string()));
        assert!(args.contains(&"--accept-keysend".to_string()));
        assert!(!args.contains(&"--accept-amp".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--feeurl=http://127.0.0.1:9000/fees"));

        let extra = args.iter().position(|a| a == "--protocol.wumbo-channels").unwrap();
        let keysend = args.iter().position(|a| a == "--accept-keysend").unwrap();
        assert!(extra < keysend);
    }

    #[test]
    fn test_seeded_node_keeps_seed_backup() {
        let mut cfg = NodeConfig::new("carol", Network::Regtest, "/n", ports());
        cfg.has_seed = true;
        assert!(!cfg.args().contains(&"--noseedbackup".to_string()));
    }

    #[test]
    fn test_timeout_defaults() {
        let t = Timeouts::default();
        assert_eq!(t.default, Duration::from_secs(30));
        assert_eq!(t.process_exit(), Duration::from_secs(60));
        assert_eq!(t.poll_interval, Duration::from_millis(20));
    }
}
