//! # Client seams.
//!
//! The controller talks to the daemon only through these traits, so bring-up and the
//! watcher can be driven by scripted fakes in tests and by [`GrpcDialer`](super::GrpcDialer)
//! in production.
//!
//! ```text
//! Dialer::dial(DialTarget) ──► ClientSet { lightning, state, unlocker }
//!                                   │
//!                                   └─ restricted() ──► UnlockerClients { state, unlocker }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::credentials::Macaroon;
use super::proto;
use crate::error::RpcError;

/// Server stream of decoded messages.
pub type RpcStream<T> = BoxStream<'static, Result<T, RpcError>>;

/// Main node service.
#[async_trait]
pub trait LightningApi: Send + Sync + 'static {
    async fn get_info(&self) -> Result<proto::GetInfoResponse, RpcError>;

    async fn describe_graph(&self, req: proto::ChannelGraphRequest) -> Result<proto::ChannelGraph, RpcError>;

    async fn subscribe_channel_graph(&self) -> Result<RpcStream<proto::GraphTopologyUpdate>, RpcError>;

    async fn wallet_balance(&self) -> Result<proto::WalletBalanceResponse, RpcError>;

    async fn stop_daemon(&self) -> Result<(), RpcError>;
}

/// Lifecycle state service.
#[async_trait]
pub trait StateApi: Send + Sync + 'static {
    async fn subscribe_state(&self) -> Result<RpcStream<proto::SubscribeStateResponse>, RpcError>;
}

/// Wallet creation and unlock service.
#[async_trait]
pub trait WalletUnlockerApi: Send + Sync + 'static {
    async fn gen_seed(&self, req: proto::GenSeedRequest) -> Result<proto::GenSeedResponse, RpcError>;

    async fn init_wallet(&self, req: proto::InitWalletRequest) -> Result<proto::InitWalletResponse, RpcError>;

    async fn unlock_wallet(&self, req: proto::UnlockWalletRequest) -> Result<(), RpcError>;

    async fn change_password(
        &self,
        req: proto::ChangePasswordRequest,
    ) -> Result<proto::ChangePasswordResponse, RpcError>;
}

/// Full client bundle produced by one dial.
#[derive(Clone)]
pub struct ClientSet {
    pub lightning: Arc<dyn LightningApi>,
    pub state: Arc<dyn StateApi>,
    pub unlocker: Arc<dyn WalletUnlockerApi>,
}

impl ClientSet {
    /// Builds a set where one value serves all three services.
    pub fn from_shared<C>(client: Arc<C>) -> Self
    where
        C: LightningApi + StateApi + WalletUnlockerApi,
    {
        Self {
            lightning: client.clone(),
            state: client.clone(),
            unlocker: client,
        }
    }

    /// The subset usable while the wallet is locked.
    pub fn restricted(&self) -> UnlockerClients {
        UnlockerClients {
            state: self.state.clone(),
            unlocker: self.unlocker.clone(),
        }
    }
}

/// Clients available before the wallet is unlocked.
#[derive(Clone)]
pub struct UnlockerClients {
    pub state: Arc<dyn StateApi>,
    pub unlocker: Arc<dyn WalletUnlockerApi>,
}

/// Where and how to dial.
#[derive(Clone, Debug)]
pub struct DialTarget {
    /// `host:port` of the RPC listener.
    pub addr: String,
    /// PEM-encoded self-signed certificate the daemon serves.
    pub tls_cert: Vec<u8>,
    /// `None` dials without credentials (unlocker services only).
    pub macaroon: Option<Macaroon>,
    pub connect_timeout: Duration,
    /// Deadline for every call: a unary response, or a stream's response headers.
    pub request_timeout: Duration,
}

/// Builds RPC connections.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(&self, target: &DialTarget) -> Result<ClientSet, RpcError>;
}
