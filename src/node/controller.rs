//! # HarnessNode – one managed daemon and everything attached to it.
//!
//! A node owns at most one *generation* at a time: the process, a cancellation token,
//! the background tasks, and whatever clients bring-up produced.
//!
//! ```text
//! start(binary, wait)
//!   ├─ Launcher::launch ─────────────► ProcessHandle + pid file
//!   └─ wait? ── Bootstrapper::start ─┬─ Locked ──► unlocker clients (init_wallet / unlock)
//!                                    └─ Active ──► watcher::spawn ─► ServerActive
//!
//! stop()
//!   ├─ publish ShutdownRequested
//!   ├─ StopDaemon (retried only while recovery is in progress) or kill
//!   ├─ wait for exit (2 × default timeout, then kill)
//!   ├─ cancel generation token ─► join tasks within stop_grace
//!   │                               ├─ ok      → AllStoppedWithin
//!   │                               └─ timeout → abort, GraceExceeded
//!   └─ drain process, reset to NotStarted
//! ```
//!
//! ## Rules
//! - Lifecycle operations (`start`, `wait_until_leader`, wallet calls, `stop`, `kill`)
//!   are serialized; queries and waits only take a snapshot and never block them.
//! - Waits race the process exit signal, so a crashed daemon fails them early.
//! - Unlocker calls are bounded by the default timeout and end early on `stop`, so a
//!   daemon that never answers cannot hold the lifecycle lock.
//! - `stop` on a node that is not running is a no-op.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bitcoin::Amount;
use bitcoin::secp256k1::PublicKey;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ids::NodeId;
use super::tasks::TaskGroup;
use crate::bootstrap::{Bootstrapper, ConnectionState, Credential, Readiness, Ready};
use crate::config::NodeConfig;
use crate::error::{BootstrapError, NodeError, RpcError};
use crate::events::{Bus, Event, EventKind};
use crate::process::{ExitSignal, Launcher, ProcessHandle};
use crate::rpc::{ClientSet, Dialer, Macaroon, UnlockerClients, WalletUnlockerApi, proto, read_macaroon};
use crate::wait::Poller;
use crate::watcher::{self, Direction, WatcherHandle, WatcherOptions, decode_channel_point};

/// Resources that only the lifecycle lock may touch.
struct Running {
    process: ProcessHandle,
    tasks: TaskGroup,
}

/// Cheap-to-clone view of the current generation.
#[derive(Clone, Default)]
struct Live {
    state: ConnectionState,
    token: Option<CancellationToken>,
    exit: Option<ExitSignal>,
    pid: Option<u32>,
    unlocker: Option<UnlockerClients>,
    clients: Option<ClientSet>,
    identity: Option<PublicKey>,
    watcher: Option<WatcherHandle>,
}

/// Controller for one daemon process.
pub struct HarnessNode {
    id: NodeId,
    label: Arc<str>,
    cfg: NodeConfig,
    bus: Bus,
    dialer: Arc<dyn Dialer>,
    lifecycle: tokio::sync::Mutex<Option<Running>>,
    live: Mutex<Live>,
    events_token: CancellationToken,
    listener: Option<JoinHandle<()>>,
}

impl HarnessNode {
    pub(super) fn new(
        id: NodeId,
        cfg: NodeConfig,
        bus: Bus,
        dialer: Arc<dyn Dialer>,
        events_token: CancellationToken,
        listener: Option<JoinHandle<()>>,
    ) -> Self {
        let label: Arc<str> = format!("{}({id})", cfg.name).into();
        Self {
            id,
            label,
            cfg,
            bus,
            dialer,
            lifecycle: tokio::sync::Mutex::new(None),
            live: Mutex::new(Live::default()),
            events_token,
            listener,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// `name(id)`, as used in events and errors.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &NodeConfig {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn state(&self) -> ConnectionState {
        self.live().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.live().pid
    }

    /// Identity key, once bring-up has resolved it.
    pub fn pub_key(&self) -> Option<PublicKey> {
        self.live().identity
    }

    /// Full client set, once the server is active.
    pub fn clients(&self) -> Option<ClientSet> {
        self.live().clients
    }

    /// Exit signal of the current process.
    pub fn exit_signal(&self) -> Option<ExitSignal> {
        self.live().exit
    }

    /// Launches the daemon; with `wait`, also brings the connection up.
    ///
    /// A failed bring-up leaves the process running; call [`HarnessNode::stop`] to tear
    /// it down.
    pub async fn start(&self, binary: impl AsRef<Path>, wait: bool) -> Result<(), NodeError> {
        const OP: &str = "start";
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            return Err(NodeError::AlreadyRunning {
                node: self.label.to_string(),
                op: OP,
            });
        }

        tokio::fs::create_dir_all(&self.cfg.base_dir)
            .await
            .map_err(|source| self.io_error(OP, source))?;
        let process = Launcher::new(self.label.clone(), self.bus.clone())
            .with_log_file(self.cfg.log_file.clone())
            .with_tail_lines(self.cfg.stderr_tail)
            .launch(binary.as_ref(), &self.cfg.args(), &self.cfg.pid_file(self.id.get()))
            .await
            .map_err(|source| NodeError::Launch {
                node: self.label.to_string(),
                op: OP,
                source,
            })?;

        self.set_live(Live {
            token: Some(CancellationToken::new()),
            exit: Some(process.exit_signal()),
            pid: Some(process.pid()),
            ..Live::default()
        });
        let running = lifecycle.insert(Running {
            process,
            tasks: TaskGroup::new(),
        });

        if !wait {
            return Ok(());
        }
        self.bring_up(OP, running, self.cfg.timeouts.default).await
    }

    /// Finishes bring-up for a node started without waiting, e.g. one that only becomes
    /// active once it wins leadership.
    pub async fn wait_until_leader(&self, timeout: Duration) -> Result<(), NodeError> {
        const OP: &str = "wait_until_leader";
        let mut lifecycle = self.lifecycle.lock().await;
        let running = lifecycle.as_mut().ok_or_else(|| self.not_ready(OP, "process"))?;
        self.bring_up(OP, running, timeout).await
    }

    /// Creates a wallet seed through the unlocker.
    pub async fn gen_seed(&self, req: proto::GenSeedRequest) -> Result<proto::GenSeedResponse, NodeError> {
        const OP: &str = "gen_seed";
        let unlocker = self.unlocker(OP)?;
        self.bounded_call(OP, unlocker.gen_seed(req)).await
    }

    /// Initialises the wallet and completes bring-up.
    ///
    /// With `stateless_init`, the admin macaroon from the response is used to connect;
    /// otherwise the daemon's admin macaroon file.
    pub async fn init_wallet(&self, req: proto::InitWalletRequest) -> Result<proto::InitWalletResponse, NodeError> {
        const OP: &str = "init_wallet";
        let mut lifecycle = self.lifecycle.lock().await;
        let running = lifecycle.as_mut().ok_or_else(|| self.not_ready(OP, "process"))?;
        let unlocker = self.unlocker(OP)?;

        let stateless = req.stateless_init;
        let resp = self.bounded_call(OP, unlocker.init_wallet(req)).await?;
        let credential = admin_credential(stateless, &resp.admin_macaroon);
        self.complete_unlock(OP, running, credential).await?;
        Ok(resp)
    }

    /// Unlocks an existing wallet and completes bring-up.
    pub async fn unlock(&self, req: proto::UnlockWalletRequest) -> Result<(), NodeError> {
        const OP: &str = "unlock";
        let mut lifecycle = self.lifecycle.lock().await;
        let running = lifecycle.as_mut().ok_or_else(|| self.not_ready(OP, "process"))?;
        let unlocker = self.unlocker(OP)?;

        self.bounded_call(OP, unlocker.unlock_wallet(req)).await?;
        self.complete_unlock(OP, running, Credential::AdminFile).await
    }

    /// Changes the wallet password of a locked node and completes bring-up.
    pub async fn change_password(
        &self,
        req: proto::ChangePasswordRequest,
    ) -> Result<proto::ChangePasswordResponse, NodeError> {
        const OP: &str = "change_password";
        let mut lifecycle = self.lifecycle.lock().await;
        let running = lifecycle.as_mut().ok_or_else(|| self.not_ready(OP, "process"))?;
        let unlocker = self.unlocker(OP)?;

        let stateless = req.stateless_init;
        let resp = self.bounded_call(OP, unlocker.change_password(req)).await?;
        let credential = admin_credential(stateless, &resp.admin_macaroon);
        self.complete_unlock(OP, running, credential).await?;
        Ok(resp)
    }

    /// Waits until both directed edges of `chan_point` are in this node's graph.
    pub async fn wait_for_network_channel_open(
        &self,
        chan_point: &proto::ChannelPoint,
        timeout: Duration,
    ) -> Result<(), NodeError> {
        self.wait_for_channel("wait_for_network_channel_open", chan_point, Direction::Open, timeout)
            .await
    }

    /// Waits until this node has seen `chan_point` closed.
    pub async fn wait_for_network_channel_close(
        &self,
        chan_point: &proto::ChannelPoint,
        timeout: Duration,
    ) -> Result<(), NodeError> {
        self.wait_for_channel("wait_for_network_channel_close", chan_point, Direction::Close, timeout)
            .await
    }

    async fn wait_for_channel(
        &self,
        op: &'static str,
        chan_point: &proto::ChannelPoint,
        direction: Direction,
        timeout: Duration,
    ) -> Result<(), NodeError> {
        let outpoint = decode_channel_point(chan_point).map_err(|source| NodeError::ChannelPoint {
            node: self.label.to_string(),
            op,
            source,
        })?;
        let live = self.live();
        let (Some(watcher), Some(exit)) = (live.watcher, live.exit) else {
            return Err(self.not_ready(op, "topology watcher"));
        };

        self.until_exit(op, &exit, async {
            watcher
                .wait(outpoint, direction, timeout)
                .await
                .map_err(|source| NodeError::Watch {
                    node: self.label.to_string(),
                    op,
                    source,
                })
        })
        .await
    }

    /// Polls GetInfo until the node reports being synced to the chain.
    ///
    /// Only transient errors are retried; any other GetInfo failure is returned at once.
    /// Returns `Ok` early when the node is being stopped.
    pub async fn wait_for_blockchain_sync(&self, timeout: Duration) -> Result<(), NodeError> {
        const OP: &str = "wait_for_blockchain_sync";
        let live = self.live();
        let (Some(clients), Some(token)) = (live.clients, live.token) else {
            return Err(self.not_ready(OP, "rpc clients"));
        };
        let lightning = clients.lightning.as_ref();
        let sample = move || async move {
            match lightning.get_info().await {
                Ok(info) => Ok(Ok(info)),
                Err(err) if err.is_transient() => Err(err),
                Err(err) => Ok(Err(err)),
            }
        };
        let poller = Poller::new(self.cfg.timeouts.sync_poll_interval, timeout);
        let synced = poller.converge(sample, |res| match res {
            Ok(info) => info.synced_to_chain,
            Err(_) => true,
        });

        tokio::select! {
            _ = token.cancelled() => Ok(()),
            res = synced => match res {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(fatal)) => Err(self.rpc_error(OP, fatal)),
                Err(t) => {
                    let detail = match (&t.last_error, &t.last_value) {
                        (Some(err), _) => format!("last error: {err}"),
                        (None, Some(Ok(info))) => format!("still syncing at height {}", info.block_height),
                        (None, _) => "no sample completed".to_string(),
                    };
                    Err(self.convergence(OP, timeout, detail))
                }
            },
        }
    }

    /// Polls the wallet until its confirmed (or unconfirmed) balance equals `expected`.
    pub async fn wait_for_balance(&self, expected: Amount, confirmed: bool) -> Result<(), NodeError> {
        const OP: &str = "wait_for_balance";
        let clients = self.clients().ok_or_else(|| self.not_ready(OP, "rpc clients"))?;
        let lightning = clients.lightning.as_ref();
        let timeout = self.cfg.timeouts.default;
        let pick = move |b: &proto::WalletBalanceResponse| {
            if confirmed {
                b.confirmed_balance
            } else {
                b.unconfirmed_balance
            }
        };
        let want = i64::try_from(expected.to_sat()).unwrap_or(i64::MAX);

        Poller::new(self.cfg.timeouts.poll_interval, timeout)
            .converge(move || lightning.wallet_balance(), |b| pick(b) == want)
            .await
            .map(|_| ())
            .map_err(|t| {
                let kind = if confirmed { "confirmed" } else { "unconfirmed" };
                let seen = match (&t.last_value, &t.last_error) {
                    (Some(b), _) => format!("{} sat", pick(b)),
                    (None, Some(err)) => format!("error: {err}"),
                    (None, None) => "nothing".to_string(),
                };
                self.convergence(OP, timeout, format!("expected {kind} balance {expected}, last observed {seen}"))
            })
    }

    /// Reads a macaroon file, waiting for the daemon to finish writing it.
    pub async fn read_macaroon(&self, path: impl AsRef<Path>, timeout: Duration) -> Result<Macaroon, NodeError> {
        const OP: &str = "read_macaroon";
        let path = path.as_ref();
        Poller::new(self.cfg.timeouts.poll_interval, timeout)
            .no_error(|| read_macaroon(path))
            .await
            .map_err(|t| {
                let detail = match t.into_last_error() {
                    Some(err) => err.to_string(),
                    None => format!("{} not readable", path.display()),
                };
                self.convergence(OP, timeout, detail)
            })
    }

    /// Appends `line` to the node's log file; a no-op when none is configured or the node
    /// is not running.
    pub async fn add_to_log(&self, line: &str) -> Result<(), NodeError> {
        let lifecycle = self.lifecycle.lock().await;
        match lifecycle.as_ref() {
            Some(running) => running
                .process
                .append_log(line)
                .await
                .map_err(|source| self.io_error("add_to_log", source)),
            None => Ok(()),
        }
    }

    /// Asks the daemon to stop, waits for it, and tears the generation down.
    pub async fn stop(&self) -> Result<(), NodeError> {
        const OP: &str = "stop";
        self.interrupt_bring_up();
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            return Ok(());
        };
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_node(self.label.clone()));

        let live = self.live();
        let mut result = Ok(());
        match &live.clients {
            Some(clients) => {
                if let Err(err) = self.request_stop(OP, clients, &running.process).await {
                    running.process.kill();
                    result = Err(err);
                }
            }
            None => running.process.kill(),
        }

        let exit_timeout = self.cfg.timeouts.process_exit();
        if tokio::time::timeout(exit_timeout, running.process.wait())
            .await
            .is_err()
        {
            running.process.kill();
            result = result.and(Err(NodeError::ProcessDidNotExit {
                node: self.label.to_string(),
                op: OP,
                timeout: exit_timeout,
            }));
        }

        let torn_down = self.teardown(running, &live).await;
        result.and(torn_down)
    }

    /// Kills the process without asking it to stop, then tears the generation down.
    pub async fn kill(&self) -> Result<(), NodeError> {
        self.interrupt_bring_up();
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.take() else {
            return Ok(());
        };
        self.bus.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_node(self.label.clone())
                .with_reason("kill"),
        );
        running.process.kill();
        running.process.wait().await;
        let live = self.live();
        self.teardown(running, &live).await
    }

    /// [`stop`](HarnessNode::stop) followed by [`cleanup`](HarnessNode::cleanup).
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        let stopped = self.stop().await;
        let cleaned = self.cleanup().await;
        stopped.and(cleaned)
    }

    /// Removes the node's base directory. Missing directories are fine.
    pub async fn cleanup(&self) -> Result<(), NodeError> {
        match tokio::fs::remove_dir_all(&self.cfg.base_dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error("cleanup", source)),
        }
    }

    /// Path of this node's pid file.
    pub fn pid_file(&self) -> PathBuf {
        self.cfg.pid_file(self.id.get())
    }

    async fn bring_up(&self, op: &'static str, running: &mut Running, budget: Duration) -> Result<(), NodeError> {
        let live = self.live();
        let (Some(token), Some(exit)) = (live.token, live.exit) else {
            return Err(self.not_ready(op, "process"));
        };
        let boot = self.bootstrapper(&token);
        let mut state = live.state;

        let readiness = self
            .until_exit(op, &exit, async {
                boot.start(self.cfg.has_seed, budget, &mut state)
                    .await
                    .map_err(|source| self.bootstrap_error(op, source))
            })
            .await;
        self.update_live(|l| l.state = state);

        match readiness? {
            Readiness::Locked(unlocker) => {
                self.update_live(|l| l.unlocker = Some(unlocker));
                Ok(())
            }
            Readiness::Active(ready) => self.activate(op, running, &boot, &token, ready).await,
        }
    }

    async fn complete_unlock(&self, op: &'static str, running: &mut Running, credential: Credential) -> Result<(), NodeError> {
        let live = self.live();
        let (Some(token), Some(exit)) = (live.token, live.exit) else {
            return Err(self.not_ready(op, "process"));
        };
        let boot = self.bootstrapper(&token);

        let ready = self
            .until_exit(op, &exit, async {
                let clients = boot
                    .connect(&credential, self.cfg.timeouts.default)
                    .await
                    .map_err(|source| self.bootstrap_error(op, source))?;
                boot.finish(clients)
                    .await
                    .map_err(|source| self.bootstrap_error(op, source))
            })
            .await?;
        self.activate(op, running, &boot, &token, ready).await
    }

    async fn activate(
        &self,
        op: &'static str,
        running: &mut Running,
        boot: &Bootstrapper,
        token: &CancellationToken,
        ready: Ready,
    ) -> Result<(), NodeError> {
        let opts = WatcherOptions {
            capacity: self.cfg.request_capacity,
            snapshot_timeout: self.cfg.timeouts.default,
        };
        let subscribed = watcher::spawn(
            self.label.clone(),
            self.bus.clone(),
            ready.clients.lightning.clone(),
            opts,
            &mut running.tasks,
            token.child_token(),
        );
        let handle = self.bounded_call(op, subscribed).await?;

        let mut state = self.live().state;
        boot.advance(&mut state, ConnectionState::ServerActive);
        self.update_live(|l| {
            l.state = state;
            l.unlocker = None;
            l.clients = Some(ready.clients);
            l.identity = Some(ready.identity);
            l.watcher = Some(handle);
        });
        Ok(())
    }

    async fn request_stop(&self, op: &'static str, clients: &ClientSet, process: &ProcessHandle) -> Result<(), NodeError> {
        let lightning = clients.lightning.as_ref();
        let label = &self.label;
        let timeout = self.cfg.timeouts.default;
        let ask = move || async move {
            match lightning.stop_daemon().await {
                Err(err) if err.is_recovery_in_progress() => Err(err),
                Err(err) => {
                    tracing::debug!(target: "lnvisor::node", node = %label, error = %err, "stop request failed; ignoring");
                    Ok(())
                }
                Ok(()) => Ok(()),
            }
        };

        let exit = process.exit_signal();
        let poller = Poller::new(self.cfg.timeouts.poll_interval, timeout);
        tokio::select! {
            res = poller.no_error(ask) => {
                res.map_err(|t| self.rpc_error(op, t.into_last_error().unwrap_or(RpcError::DeadlineExceeded(timeout))))
            }
            _ = exit.wait() => Ok(()),
        }
    }

    async fn teardown(&self, running: Running, live: &Live) -> Result<(), NodeError> {
        let Running { process, mut tasks } = running;
        if let Some(token) = &live.token {
            token.cancel();
        }

        let grace = self.cfg.timeouts.stop_grace;
        let joined = tasks.join_within(grace).await;
        let report = process.drain().await;
        tracing::debug!(target: "lnvisor::node", node = %self.label, status = %report.summary(), "process drained");
        self.set_live(Live::default());

        match joined {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::AllStoppedWithin)
                        .with_node(self.label.clone())
                        .with_timeout(grace),
                );
                Ok(())
            }
            Err(stuck) => {
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_node(self.label.clone())
                        .with_timeout(grace)
                        .with_reason(stuck.join(", ")),
                );
                Err(NodeError::GraceExceeded {
                    node: self.label.to_string(),
                    grace,
                    stuck,
                })
            }
        }
    }

    /// Cancels a bring-up still waiting for clients so `stop` can take the lifecycle lock.
    fn interrupt_bring_up(&self) {
        let live = self.live();
        if live.clients.is_some() {
            return;
        }
        if let Some(token) = &live.token {
            token.cancel();
        }
    }

    /// Runs one RPC under the default deadline; fails early when the generation is
    /// cancelled or the process exits.
    async fn bounded_call<T, F>(&self, op: &'static str, call: F) -> Result<T, NodeError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        let live = self.live();
        let (Some(token), Some(exit)) = (live.token, live.exit) else {
            return Err(self.not_ready(op, "process"));
        };
        let deadline = self.cfg.timeouts.default;
        self.until_exit(op, &exit, async {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(NodeError::Interrupted {
                    node: self.label.to_string(),
                    op,
                }),
                res = tokio::time::timeout(deadline, call) => match res {
                    Ok(res) => res.map_err(|source| self.rpc_error(op, source)),
                    Err(_) => Err(self.rpc_error(op, RpcError::DeadlineExceeded(deadline))),
                },
            }
        })
        .await
    }

    async fn until_exit<T, F>(&self, op: &'static str, exit: &ExitSignal, fut: F) -> Result<T, NodeError>
    where
        F: Future<Output = Result<T, NodeError>>,
    {
        tokio::select! {
            res = fut => res,
            report = exit.wait() => Err(NodeError::ProcessExited {
                node: self.label.to_string(),
                op,
                status: report.summary(),
            }),
        }
    }

    fn bootstrapper(&self, token: &CancellationToken) -> Bootstrapper {
        Bootstrapper::new(
            &self.cfg,
            self.label.clone(),
            self.dialer.clone(),
            self.bus.clone(),
            token.clone(),
        )
    }

    fn unlocker(&self, op: &'static str) -> Result<Arc<dyn WalletUnlockerApi>, NodeError> {
        let live = self.live();
        live.unlocker
            .map(|u| u.unlocker)
            .or_else(|| live.clients.map(|c| c.unlocker))
            .ok_or_else(|| self.not_ready(op, "unlocker clients"))
    }

    fn live(&self) -> Live {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_live(&self, live: Live) {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = live;
    }

    fn update_live(&self, f: impl FnOnce(&mut Live)) {
        f(&mut self.live.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn not_ready(&self, op: &'static str, what: &'static str) -> NodeError {
        NodeError::NotReady {
            node: self.label.to_string(),
            op,
            what,
        }
    }

    fn rpc_error(&self, op: &'static str, source: RpcError) -> NodeError {
        NodeError::Rpc {
            node: self.label.to_string(),
            op,
            source,
        }
    }

    fn bootstrap_error(&self, op: &'static str, source: BootstrapError) -> NodeError {
        NodeError::Bootstrap {
            node: self.label.to_string(),
            op,
            source,
        }
    }

    fn io_error(&self, op: &'static str, source: std::io::Error) -> NodeError {
        NodeError::Io {
            node: self.label.to_string(),
            op,
            source,
        }
    }

    fn convergence(&self, op: &'static str, timeout: Duration, detail: String) -> NodeError {
        NodeError::Convergence {
            node: self.label.to_string(),
            op,
            timeout,
            detail,
        }
    }
}

impl Drop for HarnessNode {
    fn drop(&mut self) {
        self.events_token.cancel();
        if let Some(token) = &self.live().token {
            token.cancel();
        }
        if let Some(listener) = &self.listener {
            listener.abort();
        }
    }
}

fn admin_credential(stateless: bool, admin_macaroon: &[u8]) -> Credential {
    if stateless {
        Credential::Explicit(Macaroon::new(admin_macaroon.to_vec()))
    } else {
        Credential::AdminFile
    }
}
