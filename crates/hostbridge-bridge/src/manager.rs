use std::sync::Arc;

use hostbridge_codec::Value;
use tracing::{info, warn};

use crate::adapter::{send_with, Bridge, BridgeFuture};
use crate::direct::{DirectBridge, Host};
use crate::error::Result;
use crate::http::{HttpBridge, HttpBridgeConfig};
use crate::notify::NotificationBus;
use crate::posted::{resolve_correlated, resolve_correlated_base64, PostedBridge, Poster};
use crate::registry::CorrelationRegistry;

/// Owns the active bridge together with the registries its transport needs.
///
/// One manager per guest. Embedders route inbound host traffic to
/// [`on_reply`](Self::on_reply) (correlated replies) and
/// [`on_push`](Self::on_push) (push envelopes).
#[derive(Clone)]
pub struct TransportManager {
    bridge: Arc<dyn Bridge>,
    bus: Arc<NotificationBus>,
    registry: Option<Arc<CorrelationRegistry>>,
}

impl TransportManager {
    /// Use a host reachable by direct function call.
    pub fn direct<H: Host + 'static>(host: H) -> Self {
        Self::with_bridge(Arc::new(DirectBridge::new(host)))
    }

    /// Use a host reachable over HTTP.
    pub fn http(config: HttpBridgeConfig) -> Result<Self> {
        Ok(Self::with_bridge(Arc::new(HttpBridge::new(config)?)))
    }

    /// Use a fire-and-forget channel; replies come back through `on_reply`.
    pub fn posted<P: Poster + 'static>(poster: P) -> Self {
        let registry = Arc::new(CorrelationRegistry::new());
        let bridge = PostedBridge::with_registry(poster, Arc::clone(&registry));
        let mut manager = Self::with_bridge(Arc::new(bridge));
        manager.registry = Some(registry);
        manager
    }

    /// Use any other bridge implementation.
    pub fn with_bridge(bridge: Arc<dyn Bridge>) -> Self {
        info!(transport = bridge.name(), "bridge transport selected");
        Self {
            bridge,
            bus: Arc::new(NotificationBus::new()),
            registry: None,
        }
    }

    /// Share an existing notification bus.
    pub fn with_bus(mut self, bus: Arc<NotificationBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Send `opcode` with `args` over the active bridge.
    pub fn send(&self, opcode: u8, args: Vec<Value>) -> BridgeFuture<'_, Vec<Value>> {
        self.bridge.send(opcode, args)
    }

    /// Send and apply a per-call transform to the reply.
    pub async fn send_with<T, F>(&self, opcode: u8, args: Vec<Value>, transform: F) -> Result<T>
    where
        F: FnOnce(Vec<Value>) -> Result<T>,
    {
        send_with(self.bridge.as_ref(), opcode, args, transform).await
    }

    /// Feed a correlated reply from the host.
    pub fn on_reply(&self, reply: &[u8]) -> bool {
        match &self.registry {
            Some(registry) => resolve_correlated(registry, reply),
            None => self.uncorrelated_reply(),
        }
    }

    /// Feed a base64-encoded correlated reply from the host.
    pub fn on_reply_base64(&self, text: &str) -> Result<bool> {
        match &self.registry {
            Some(registry) => resolve_correlated_base64(registry, text),
            None => Ok(self.uncorrelated_reply()),
        }
    }

    fn uncorrelated_reply(&self) -> bool {
        warn!(
            transport = self.bridge.name(),
            "correlated reply on a transport without a registry; dropping"
        );
        false
    }

    /// Feed a JSON push envelope from the host.
    pub fn on_push(&self, raw: &str) -> Result<usize> {
        self.bus.dispatch_envelope(raw)
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// The correlation registry, for transports that use one.
    pub fn registry(&self) -> Option<&Arc<CorrelationRegistry>> {
        self.registry.as_ref()
    }

    pub fn transport_name(&self) -> &'static str {
        self.bridge.name()
    }
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager")
            .field("transport", &self.bridge.name())
            .field("bus", &self.bus)
            .field("registry", &self.registry)
            .finish()
    }
}
