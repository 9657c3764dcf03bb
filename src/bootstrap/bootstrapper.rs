//! # Two-phase connection bring-up.
//!
//! ```text
//! start(has_seed)
//!   ├─ connect ─────────── poll: read tls.cert (+ admin.macaroon) → dial
//!   │                       transient errors retried, anything else returned at once
//!   ├─ gate 1 ──────────── state stream leaves WAITING_TO_START   (remaining budget)
//!   ├─ has_seed? ───────── Readiness::Locked(unlocker clients)    ⟵ caller inits / unlocks
//!   └─ finish
//!        ├─ gate 2 ─────── new state stream reaches SERVER_ACTIVE (node_start budget)
//!        ├─ identity ───── poll GetInfo until the pubkey parses
//!        └─ probe ──────── poll: topology subscription is silent or delivers
//! ```
//!
//! Every step also races the node's cancellation token; shutting the node down during
//! bring-up returns [`BootstrapError::Cancelled`].

use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bitcoin::secp256k1::PublicKey;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::gates;
use super::state::ConnectionState;
use crate::config::{NodeConfig, Timeouts};
use crate::error::{BootstrapError, Gate, RpcError};
use crate::events::{Bus, Event, EventKind};
use crate::rpc::{ClientSet, DialTarget, Dialer, Macaroon, UnlockerClients, read_macaroon, read_tls_cert};
use crate::wait::{Pacing, Poller};

/// Dial retries start at the poll interval and double up to this cap.
const DIAL_BACKOFF_CAP: Duration = Duration::from_millis(500);

/// Which macaroon a dial presents.
#[derive(Clone, Debug)]
pub enum Credential {
    /// No macaroon; only the unlocker services will answer.
    None,
    /// Read the admin macaroon file, waiting for it to appear.
    AdminFile,
    /// A macaroon handed back by a stateless init or password change.
    Explicit(Macaroon),
}

/// Where `start` stopped.
pub enum Readiness {
    /// The wallet needs to be initialised or unlocked first.
    Locked(UnlockerClients),
    Active(Ready),
}

/// A fully brought-up connection.
#[derive(Clone)]
pub struct Ready {
    pub clients: ClientSet,
    pub identity: PublicKey,
}

pub struct Bootstrapper {
    label: Arc<str>,
    rpc_addr: String,
    tls_cert_path: PathBuf,
    admin_macaroon_path: PathBuf,
    timeouts: Timeouts,
    dialer: Arc<dyn Dialer>,
    bus: Bus,
    token: CancellationToken,
}

impl Bootstrapper {
    pub fn new(cfg: &NodeConfig, label: Arc<str>, dialer: Arc<dyn Dialer>, bus: Bus, token: CancellationToken) -> Self {
        Self {
            label,
            rpc_addr: cfg.rpc_addr(),
            tls_cert_path: cfg.tls_cert_path(),
            admin_macaroon_path: cfg.admin_macaroon_path(),
            timeouts: cfg.timeouts.clone(),
            dialer,
            bus,
            token,
        }
    }

    /// Phase one, plus phase two when the wallet needs no unlock.
    ///
    /// Connect and the first gate share `budget`.
    pub async fn start(
        &self,
        has_seed: bool,
        budget: Duration,
        state: &mut ConnectionState,
    ) -> Result<Readiness, BootstrapError> {
        let began = Instant::now();
        let credential = if has_seed {
            Credential::None
        } else {
            Credential::AdminFile
        };

        let clients = self.connect(&credential, budget).await?;
        self.advance(state, ConnectionState::WaitingToStart);

        let remaining = budget.saturating_sub(began.elapsed());
        self.guarded(
            Gate::Started,
            gates::wait_until_started(clients.state.as_ref(), remaining),
        )
        .await?;

        if has_seed {
            self.advance(state, ConnectionState::Unlocking);
            return Ok(Readiness::Locked(clients.restricted()));
        }
        self.finish(clients).await.map(Readiness::Active)
    }

    /// Phase two: second gate, identity, topology probe.
    pub async fn finish(&self, clients: ClientSet) -> Result<Ready, BootstrapError> {
        self.guarded(
            Gate::ServerActive,
            gates::wait_until_server_active(clients.state.as_ref(), self.timeouts.node_start),
        )
        .await?;
        let identity = self.fetch_identity(&clients).await?;
        self.probe_topology(&clients).await?;
        Ok(Ready { clients, identity })
    }

    /// Dials until the endpoint accepts, retrying transient failures until `timeout`.
    pub async fn connect(&self, credential: &Credential, timeout: Duration) -> Result<ClientSet, BootstrapError> {
        let this = self;
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let op = move || async move {
            let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let result = this.dial_once(credential).await;
            match result {
                Ok(clients) => Ok(Ok(clients)),
                Err(err) if err.is_transient() => {
                    this.bus.publish(
                        Event::new(EventKind::ConnectRetry)
                            .with_node(this.label.clone())
                            .with_attempt(n)
                            .with_reason(err.to_string()),
                    );
                    Err(err)
                }
                Err(err) => Ok(Err(err)),
            }
        };

        let clients = self
            .guarded(Gate::Connect, async {
                self.dial_poller(timeout)
                    .no_error(op)
                    .await
                    .map_err(|t| BootstrapError::Timeout {
                        gate: Gate::Connect,
                        timeout,
                        last_error: t.into_last_error(),
                    })?
                    .map_err(|source| BootstrapError::Protocol {
                        gate: Gate::Connect,
                        source,
                    })
            })
            .await?;

        let kind = match credential {
            Credential::None => "restricted",
            _ => "full",
        };
        self.bus.publish(
            Event::new(EventKind::ClientsReady)
                .with_node(self.label.clone())
                .with_reason(kind),
        );
        Ok(clients)
    }

    async fn dial_once(&self, credential: &Credential) -> Result<ClientSet, RpcError> {
        let tls_cert = read_tls_cert(&self.tls_cert_path).await?;
        let macaroon = match credential {
            Credential::None => None,
            Credential::AdminFile => Some(read_macaroon(&self.admin_macaroon_path).await?),
            Credential::Explicit(mac) => Some(mac.clone()),
        };
        let target = DialTarget {
            addr: self.rpc_addr.clone(),
            tls_cert,
            macaroon,
            connect_timeout: self.timeouts.default,
            request_timeout: self.timeouts.default,
        };
        self.dialer.dial(&target).await
    }

    /// Polls GetInfo until it returns a parseable identity key.
    pub async fn fetch_identity(&self, clients: &ClientSet) -> Result<PublicKey, BootstrapError> {
        let lightning = clients.lightning.as_ref();
        let timeout = self.timeouts.default;
        let op = move || async move {
            let info = lightning.get_info().await?;
            PublicKey::from_str(&info.identity_pubkey).map_err(|e| {
                RpcError::Malformed(format!("identity pubkey {:?}: {e}", info.identity_pubkey))
            })
        };

        let identity = self
            .guarded(Gate::Identity, async {
                self.poller(timeout)
                    .no_error(op)
                    .await
                    .map_err(|t| BootstrapError::Timeout {
                        gate: Gate::Identity,
                        timeout,
                        last_error: t.into_last_error(),
                    })
            })
            .await?;

        self.bus.publish(
            Event::new(EventKind::IdentityResolved)
                .with_node(self.label.clone())
                .with_reason(identity.to_string()),
        );
        Ok(identity)
    }

    /// Confirms the topology subscription works: silence for `topology_probe` or a first
    /// update both count as healthy; a stream error or close is retried.
    pub async fn probe_topology(&self, clients: &ClientSet) -> Result<(), BootstrapError> {
        let lightning = clients.lightning.as_ref();
        let probe = self.timeouts.topology_probe;
        let timeout = self.timeouts.default;
        let op = move || async move {
            let mut stream = lightning.subscribe_channel_graph().await?;
            match tokio::time::timeout(probe, stream.next()).await {
                Err(_) | Ok(Some(Ok(_))) => Ok(()),
                Ok(Some(Err(err))) => Err(err),
                Ok(None) => Err(RpcError::StreamClosed),
            }
        };

        self.guarded(Gate::TopologyProbe, async {
            self.poller(timeout)
                .no_error(op)
                .await
                .map_err(|t| BootstrapError::Timeout {
                    gate: Gate::TopologyProbe,
                    timeout,
                    last_error: t.into_last_error(),
                })
        })
        .await
    }

    /// Advances `state`, publishing `StateChanged` when it moves.
    pub fn advance(&self, state: &mut ConnectionState, next: ConnectionState) {
        if state.advance(next) {
            self.bus.publish(
                Event::new(EventKind::StateChanged)
                    .with_node(self.label.clone())
                    .with_state(next.as_str()),
            );
        }
    }

    fn poller(&self, timeout: Duration) -> Poller {
        Poller::new(self.timeouts.poll_interval, timeout)
    }

    fn dial_poller(&self, timeout: Duration) -> Poller {
        let first = self.timeouts.poll_interval;
        let pacing = Pacing {
            first,
            max: DIAL_BACKOFF_CAP.max(first),
            factor: 2.0,
        };
        Poller::with_pacing(pacing, timeout)
    }

    async fn guarded<T, F>(&self, gate: Gate, fut: F) -> Result<T, BootstrapError>
    where
        F: Future<Output = Result<T, BootstrapError>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(BootstrapError::Cancelled { gate }),
            res = fut => res,
        }
    }
}
