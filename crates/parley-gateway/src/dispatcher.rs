use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

use crate::registry::PresenceRegistry;

/// The push channel: targeted best-effort delivery through the presence
/// registry, plus a broadcast bus every connection subscribes to. Cloned into
/// request handlers via application state, never held as a global.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel — all connections subscribed at send time receive
    /// the event; later subscribers do not.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Online users and their connection handles.
    registry: PresenceRegistry,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                registry: PresenceRegistry::new(),
            }),
        }
    }

    /// Subscribe to broadcast events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to every currently connected client.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Send a targeted event to one user. At-most-once, no buffering; a
    /// no-op when the user is not connected.
    pub async fn emit_to(&self, user_id: Uuid, event: GatewayEvent) {
        self.inner.registry.send_to(user_id, event).await;
    }

    /// Register a user as online and announce the updated online set to
    /// everyone. Returns the connection id and the targeted-event receiver.
    pub async fn connect(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let (conn_id, rx) = self.inner.registry.register(user_id).await;
        self.broadcast_presence().await;
        (conn_id, rx)
    }

    /// Unregister a connection. Announces the updated online set only if the
    /// connection still owned the user's entry; a stale disconnect after a
    /// reconnect changes nothing.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) {
        if self.inner.registry.unregister(user_id, conn_id).await {
            self.broadcast_presence().await;
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.registry.is_online(user_id).await
    }

    async fn broadcast_presence(&self) {
        let online = self.inner.registry.online_ids().await;
        self.broadcast(GatewayEvent::PresenceChanged { online });
    }
}
