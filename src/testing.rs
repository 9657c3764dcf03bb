//! Scripted in-process daemon used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Txid};
use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc;

use crate::error::RpcError;
use crate::rpc::proto::{self, WalletState};
use crate::rpc::{ClientSet, DialTarget, Dialer, LightningApi, Macaroon, RpcStream, StateApi, WalletUnlockerApi};
use crate::watcher::channel_point;

/// Compressed secp256k1 generator point.
pub(crate) const PUBKEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

pub(crate) fn outpoint(n: u8) -> OutPoint {
    OutPoint::new(Txid::from_byte_array([n; 32]), u32::from(n))
}

pub(crate) fn edge_update(ops: &[OutPoint]) -> proto::GraphTopologyUpdate {
    proto::GraphTopologyUpdate {
        channel_updates: ops
            .iter()
            .map(|op| proto::ChannelEdgeUpdate {
                chan_point: Some(channel_point(op)),
                ..Default::default()
            })
            .collect(),
        closed_chans: Vec::new(),
    }
}

pub(crate) fn close_update(ops: &[OutPoint]) -> proto::GraphTopologyUpdate {
    proto::GraphTopologyUpdate {
        channel_updates: Vec::new(),
        closed_chans: ops
            .iter()
            .map(|op| proto::ClosedChannelUpdate {
                chan_point: Some(channel_point(op)),
                ..Default::default()
            })
            .collect(),
    }
}

/// What a lifecycle stream does after its scripted states.
#[derive(Clone)]
pub(crate) enum StreamEnd {
    Hang,
    Close,
    Fail(RpcError),
}

type TopologySender = mpsc::UnboundedSender<Result<proto::GraphTopologyUpdate, RpcError>>;

pub(crate) struct FakeNode {
    states: Mutex<(Vec<WalletState>, StreamEnd)>,
    info_failures: AtomicUsize,
    info_error: Mutex<Option<RpcError>>,
    unlocker_hangs: AtomicBool,
    identity: Mutex<String>,
    graph: Mutex<Vec<String>>,
    topology: Mutex<Vec<TopologySender>>,
    topology_subscribe_error: Mutex<Option<RpcError>>,
    balance: Mutex<proto::WalletBalanceResponse>,
    synced: AtomicBool,
    stop_errors: Mutex<VecDeque<RpcError>>,
    on_stop: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    pub(crate) stop_calls: AtomicUsize,
    pub(crate) unlock_calls: AtomicUsize,
    pub(crate) init_calls: AtomicUsize,
    pub(crate) state_subscriptions: AtomicUsize,
    admin_macaroon: Mutex<Vec<u8>>,
}

impl FakeNode {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new((vec![WalletState::ServerActive], StreamEnd::Hang)),
            info_failures: AtomicUsize::new(0),
            info_error: Mutex::new(None),
            unlocker_hangs: AtomicBool::new(false),
            identity: Mutex::new(PUBKEY.to_string()),
            graph: Mutex::new(Vec::new()),
            topology: Mutex::new(Vec::new()),
            topology_subscribe_error: Mutex::new(None),
            balance: Mutex::new(proto::WalletBalanceResponse::default()),
            synced: AtomicBool::new(true),
            stop_errors: Mutex::new(VecDeque::new()),
            on_stop: Mutex::new(None),
            stop_calls: AtomicUsize::new(0),
            unlock_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            state_subscriptions: AtomicUsize::new(0),
            admin_macaroon: Mutex::new(vec![0x02, 0x01]),
        })
    }

    /// Every lifecycle subscription replays `states`, then behaves as `end`.
    pub(crate) fn script_states(&self, states: &[WalletState], end: StreamEnd) {
        *self.states.lock().unwrap() = (states.to_vec(), end);
    }

    pub(crate) fn fail_get_info(&self, times: usize) {
        self.info_failures.store(times, Ordering::SeqCst);
    }

    /// Every GetInfo fails with `err` from now on.
    pub(crate) fn break_get_info(&self, err: RpcError) {
        *self.info_error.lock().unwrap() = Some(err);
    }

    /// Unlocker calls never answer from now on.
    pub(crate) fn hang_unlocker(&self) {
        self.unlocker_hangs.store(true, Ordering::SeqCst);
    }

    async fn unlocker_gate(&self) {
        if self.unlocker_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    pub(crate) fn set_identity(&self, pubkey: &str) {
        *self.identity.lock().unwrap() = pubkey.to_string();
    }

    pub(crate) fn set_graph(&self, ops: &[OutPoint]) {
        *self.graph.lock().unwrap() = ops.iter().map(ToString::to_string).collect();
    }

    pub(crate) fn fail_topology_subscribe(&self, err: RpcError) {
        *self.topology_subscribe_error.lock().unwrap() = Some(err);
    }

    /// Delivers an update to every live topology subscription.
    pub(crate) fn push_update(&self, update: proto::GraphTopologyUpdate) {
        self.topology
            .lock()
            .unwrap()
            .retain(|tx| tx.send(Ok(update.clone())).is_ok());
    }

    /// Fails every live topology subscription.
    pub(crate) fn break_topology(&self, err: RpcError) {
        for tx in self.topology.lock().unwrap().drain(..) {
            let _ = tx.send(Err(err.clone()));
        }
    }

    pub(crate) fn set_balance(&self, confirmed: i64, unconfirmed: i64) {
        *self.balance.lock().unwrap() = proto::WalletBalanceResponse {
            total_balance: confirmed + unconfirmed,
            confirmed_balance: confirmed,
            unconfirmed_balance: unconfirmed,
        };
    }

    pub(crate) fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    pub(crate) fn queue_stop_error(&self, err: RpcError) {
        self.stop_errors.lock().unwrap().push_back(err);
    }

    pub(crate) fn on_stop(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.on_stop.lock().unwrap() = Some(Box::new(f));
    }

    pub(crate) fn set_admin_macaroon(&self, bytes: &[u8]) {
        *self.admin_macaroon.lock().unwrap() = bytes.to_vec();
    }
}

#[async_trait]
impl LightningApi for FakeNode {
    async fn get_info(&self) -> Result<proto::GetInfoResponse, RpcError> {
        if let Some(err) = self.info_error.lock().unwrap().clone() {
            return Err(err);
        }
        let remaining = self.info_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.info_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RpcError::from(tonic::Status::unavailable("server starting")));
        }
        Ok(proto::GetInfoResponse {
            identity_pubkey: self.identity.lock().unwrap().clone(),
            synced_to_chain: self.synced.load(Ordering::SeqCst),
            ..Default::default()
        })
    }

    async fn describe_graph(&self, _req: proto::ChannelGraphRequest) -> Result<proto::ChannelGraph, RpcError> {
        let edges = self
            .graph
            .lock()
            .unwrap()
            .iter()
            .map(|cp| proto::ChannelEdge {
                chan_point: cp.clone(),
                ..Default::default()
            })
            .collect();
        Ok(proto::ChannelGraph { edges })
    }

    async fn subscribe_channel_graph(&self) -> Result<RpcStream<proto::GraphTopologyUpdate>, RpcError> {
        if let Some(err) = self.topology_subscribe_error.lock().unwrap().clone() {
            return Err(err);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.topology.lock().unwrap().push(tx);
        Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed())
    }

    async fn wallet_balance(&self) -> Result<proto::WalletBalanceResponse, RpcError> {
        Ok(self.balance.lock().unwrap().clone())
    }

    async fn stop_daemon(&self) -> Result<(), RpcError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.stop_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        if let Some(f) = self.on_stop.lock().unwrap().as_ref() {
            f();
        }
        Ok(())
    }
}

#[async_trait]
impl StateApi for FakeNode {
    async fn subscribe_state(&self) -> Result<RpcStream<proto::SubscribeStateResponse>, RpcError> {
        self.state_subscriptions.fetch_add(1, Ordering::SeqCst);
        let (states, end) = self.states.lock().unwrap().clone();
        let head = stream::iter(
            states
                .into_iter()
                .map(|s| Ok(proto::SubscribeStateResponse { state: s as i32 })),
        );
        Ok(match end {
            StreamEnd::Hang => head.chain(stream::pending()).boxed(),
            StreamEnd::Close => head.boxed(),
            StreamEnd::Fail(err) => head.chain(stream::iter([Err(err)])).boxed(),
        })
    }
}

#[async_trait]
impl WalletUnlockerApi for FakeNode {
    async fn gen_seed(&self, _req: proto::GenSeedRequest) -> Result<proto::GenSeedResponse, RpcError> {
        Ok(proto::GenSeedResponse {
            cipher_seed_mnemonic: vec!["abandon".to_string(); 24],
            enciphered_seed: vec![0; 33],
        })
    }

    async fn init_wallet(&self, _req: proto::InitWalletRequest) -> Result<proto::InitWalletResponse, RpcError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.unlocker_gate().await;
        Ok(proto::InitWalletResponse {
            admin_macaroon: self.admin_macaroon.lock().unwrap().clone(),
        })
    }

    async fn unlock_wallet(&self, _req: proto::UnlockWalletRequest) -> Result<(), RpcError> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        self.unlocker_gate().await;
        Ok(())
    }

    async fn change_password(
        &self,
        _req: proto::ChangePasswordRequest,
    ) -> Result<proto::ChangePasswordResponse, RpcError> {
        self.unlocker_gate().await;
        Ok(proto::ChangePasswordResponse {
            admin_macaroon: self.admin_macaroon.lock().unwrap().clone(),
        })
    }
}

/// Dialer handing out [`FakeNode`] clients, optionally refusing the first few dials.
pub(crate) struct FakeDialer {
    node: Arc<FakeNode>,
    refusals: AtomicUsize,
    fatal: Mutex<Option<RpcError>>,
    pub(crate) dials: Mutex<Vec<Option<Macaroon>>>,
}

impl FakeDialer {
    pub(crate) fn new(node: Arc<FakeNode>) -> Arc<Self> {
        Arc::new(Self {
            node,
            refusals: AtomicUsize::new(0),
            fatal: Mutex::new(None),
            dials: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn refuse(&self, times: usize) {
        self.refusals.store(times, Ordering::SeqCst);
    }

    pub(crate) fn fail_with(&self, err: RpcError) {
        *self.fatal.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    async fn dial(&self, target: &DialTarget) -> Result<ClientSet, RpcError> {
        if let Some(err) = self.fatal.lock().unwrap().clone() {
            return Err(err);
        }
        let remaining = self.refusals.load(Ordering::SeqCst);
        if remaining > 0 {
            self.refusals.store(remaining - 1, Ordering::SeqCst);
            return Err(RpcError::Unavailable(format!("{}: connection refused", target.addr)));
        }
        self.dials.lock().unwrap().push(target.macaroon.clone());
        Ok(ClientSet::from_shared(self.node.clone()))
    }
}

/// Writes the credential files a started daemon would leave behind.
pub(crate) async fn write_credentials(cfg: &crate::NodeConfig) {
    tokio::fs::create_dir_all(cfg.network_dir()).await.unwrap();
    tokio::fs::write(
        cfg.tls_cert_path(),
        "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n",
    )
    .await
    .unwrap();
    tokio::fs::write(cfg.admin_macaroon_path(), [0x02, 0x01, 0x0f]).await.unwrap();
}
