use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::controller::HarnessNode;
use super::ids::NodeId;
use crate::config::NodeConfig;
use crate::events::Bus;
use crate::rpc::{Dialer, GrpcDialer};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`HarnessNode`].
pub struct NodeBuilder {
    cfg: NodeConfig,
    id: NodeId,
    dialer: Option<Arc<dyn Dialer>>,
    bus: Option<Bus>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl NodeBuilder {
    /// Creates a builder for node `id` (usually from [`NodeIds::next`](super::NodeIds::next)).
    pub fn new(cfg: NodeConfig, id: NodeId) -> Self {
        Self {
            cfg,
            id,
            dialer: None,
            bus: None,
            subscribers: Vec::new(),
        }
    }

    /// Replaces the gRPC dialer, e.g. with an in-process fake.
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Publishes onto an existing bus instead of a private one, so several nodes can
    /// share one event stream.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Sets event subscribers.
    ///
    /// Each subscriber gets its own worker and bounded queue; see [`SubscriberSet`].
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the node. Must be called from within a tokio runtime when subscribers are set.
    pub fn build(self) -> HarnessNode {
        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity.max(1)));
        let dialer = self.dialer.unwrap_or_else(|| Arc::new(GrpcDialer) as Arc<dyn Dialer>);

        let events_token = CancellationToken::new();
        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            Some(set.attach(events_token.clone()))
        };

        HarnessNode::new(self.id, self.cfg, bus, dialer, events_token, listener)
    }
}
