//! RPC access to the daemon.
//!
//! - [`api`]: the client traits, [`ClientSet`]/[`UnlockerClients`] and the [`Dialer`] seam.
//! - [`proto`]: hand-written prost messages for the calls the controller makes.
//! - [`GrpcDialer`]: tonic implementation with TLS pinning and macaroon metadata.
//! - [`read_macaroon`]/[`read_tls_cert`]: credential reads that treat half-written
//!   files as transient.

pub mod api;
mod credentials;
mod grpc;
pub mod proto;

pub use api::{
    ClientSet, DialTarget, Dialer, LightningApi, RpcStream, StateApi, UnlockerClients, WalletUnlockerApi,
};
pub use credentials::{Macaroon, read_macaroon, read_tls_cert};
pub use grpc::{GrpcClient, GrpcDialer, MacaroonInterceptor};
