//! gRPC transport over tonic.
//!
//! One TLS [`Channel`] per dial, wrapped with [`MacaroonInterceptor`]; a single
//! [`GrpcClient`] serves all three services by path.
//!
//! The daemon's certificate is self-signed and issued for `localhost`, so it is pinned
//! as the only trusted CA and the TLS server name is fixed to `localhost`.

use async_trait::async_trait;
use futures::StreamExt;
use tonic::codec::ProstCodec;
use tonic::codegen::InterceptedService;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::transport::{Certificate, Channel, ClientTlsConfig};
use tonic::{Request, Status};

use super::api::{ClientSet, DialTarget, Dialer, LightningApi, RpcStream, StateApi, WalletUnlockerApi};
use super::credentials::Macaroon;
use super::proto;
use crate::error::RpcError;

const TLS_DOMAIN: &str = "localhost";

/// Adds the hex macaroon to every request's metadata.
#[derive(Clone)]
pub struct MacaroonInterceptor {
    macaroon: Option<MetadataValue<Ascii>>,
}

impl MacaroonInterceptor {
    pub fn new(macaroon: Option<&Macaroon>) -> Result<Self, RpcError> {
        let macaroon = macaroon
            .map(|m| {
                m.to_hex()
                    .parse::<MetadataValue<Ascii>>()
                    .map_err(|e| RpcError::Malformed(format!("macaroon metadata: {e}")))
            })
            .transpose()?;
        Ok(Self { macaroon })
    }
}

impl Interceptor for MacaroonInterceptor {
    fn call(&mut self, mut req: Request<()>) -> Result<Request<()>, Status> {
        if let Some(mac) = &self.macaroon {
            req.metadata_mut().insert("macaroon", mac.clone());
        }
        Ok(req)
    }
}

type AuthChannel = InterceptedService<Channel, MacaroonInterceptor>;

/// Path-addressed client for the `lnrpc` services.
#[derive(Clone)]
pub struct GrpcClient {
    inner: tonic::client::Grpc<AuthChannel>,
}

impl GrpcClient {
    pub fn new(channel: Channel, interceptor: MacaroonInterceptor) -> Self {
        Self {
            inner: tonic::client::Grpc::new(InterceptedService::new(channel, interceptor)),
        }
    }

    async fn unary<Req, Resp>(&self, req: Req, path: &'static str) -> Result<Resp, RpcError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| RpcError::Unavailable(format!("service not ready: {e}")))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let resp = grpc
            .unary(Request::new(req), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(resp.into_inner())
    }

    async fn server_streaming<Req, Resp>(&self, req: Req, path: &'static str) -> Result<RpcStream<Resp>, RpcError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| RpcError::Unavailable(format!("service not ready: {e}")))?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let stream = grpc
            .server_streaming(Request::new(req), PathAndQuery::from_static(path), codec)
            .await?
            .into_inner();
        Ok(stream.map(|item| item.map_err(RpcError::from)).boxed())
    }
}

#[async_trait]
impl LightningApi for GrpcClient {
    async fn get_info(&self) -> Result<proto::GetInfoResponse, RpcError> {
        self.unary(proto::GetInfoRequest {}, "/lnrpc.Lightning/GetInfo").await
    }

    async fn describe_graph(&self, req: proto::ChannelGraphRequest) -> Result<proto::ChannelGraph, RpcError> {
        self.unary(req, "/lnrpc.Lightning/DescribeGraph").await
    }

    async fn subscribe_channel_graph(&self) -> Result<RpcStream<proto::GraphTopologyUpdate>, RpcError> {
        self.server_streaming(
            proto::GraphTopologySubscription {},
            "/lnrpc.Lightning/SubscribeChannelGraph",
        )
        .await
    }

    async fn wallet_balance(&self) -> Result<proto::WalletBalanceResponse, RpcError> {
        self.unary(proto::WalletBalanceRequest {}, "/lnrpc.Lightning/WalletBalance")
            .await
    }

    async fn stop_daemon(&self) -> Result<(), RpcError> {
        let _: proto::StopResponse = self
            .unary(proto::StopRequest {}, "/lnrpc.Lightning/StopDaemon")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StateApi for GrpcClient {
    async fn subscribe_state(&self) -> Result<RpcStream<proto::SubscribeStateResponse>, RpcError> {
        self.server_streaming(proto::SubscribeStateRequest {}, "/lnrpc.State/SubscribeState")
            .await
    }
}

#[async_trait]
impl WalletUnlockerApi for GrpcClient {
    async fn gen_seed(&self, req: proto::GenSeedRequest) -> Result<proto::GenSeedResponse, RpcError> {
        self.unary(req, "/lnrpc.WalletUnlocker/GenSeed").await
    }

    async fn init_wallet(&self, req: proto::InitWalletRequest) -> Result<proto::InitWalletResponse, RpcError> {
        self.unary(req, "/lnrpc.WalletUnlocker/InitWallet").await
    }

    async fn unlock_wallet(&self, req: proto::UnlockWalletRequest) -> Result<(), RpcError> {
        let _: proto::UnlockWalletResponse = self.unary(req, "/lnrpc.WalletUnlocker/UnlockWallet").await?;
        Ok(())
    }

    async fn change_password(
        &self,
        req: proto::ChangePasswordRequest,
    ) -> Result<proto::ChangePasswordResponse, RpcError> {
        self.unary(req, "/lnrpc.WalletUnlocker/ChangePassword").await
    }
}

/// Dials the daemon over TLS.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcDialer;

#[async_trait]
impl Dialer for GrpcDialer {
    async fn dial(&self, target: &DialTarget) -> Result<ClientSet, RpcError> {
        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&target.tls_cert))
            .domain_name(TLS_DOMAIN);
        let endpoint = Channel::from_shared(format!("https://{}", target.addr))
            .map_err(|e| RpcError::Malformed(format!("rpc address {}: {e}", target.addr)))?
            .tls_config(tls)
            .map_err(|e| RpcError::Malformed(format!("tls config: {e}")))?
            .connect_timeout(target.connect_timeout)
            .timeout(target.request_timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| RpcError::Unavailable(format!("{}: {e}", target.addr)))?;

        let interceptor = MacaroonInterceptor::new(target.macaroon.as_ref())?;
        Ok(ClientSet::from_shared(std::sync::Arc::new(GrpcClient::new(
            channel,
            interceptor,
        ))))
    }
}
