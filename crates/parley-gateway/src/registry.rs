use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// A live connection handle: the send channel into the connection's write
/// loop, plus a per-connection id so a stale disconnect cannot evict a newer
/// connection for the same user.
struct PresenceEntry {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// In-memory map of user id -> active connection handle. Exactly one handle
/// per user; registering again replaces the previous one (last connection
/// wins). All mutation is serialized through the write lock. State is
/// volatile and rebuilds as clients reconnect.
#[derive(Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<Uuid, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a user to a fresh connection handle. Returns the connection id
    /// and the receiving end the connection loop drains.
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.entries
            .write()
            .await
            .insert(user_id, PresenceEntry { conn_id, tx });
        (conn_id, rx)
    }

    /// Remove the user's entry, but only if `conn_id` still owns it. Returns
    /// whether an entry was removed — false means a newer connection has
    /// taken over and nothing was touched.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&user_id) {
            Some(entry) if entry.conn_id == conn_id => {
                entries.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Best-effort targeted delivery: silently a no-op when the user has no
    /// live handle or the handle's receiver is gone.
    pub async fn send_to(&self, user_id: Uuid, event: GatewayEvent) {
        let entries = self.entries.read().await;
        if let Some(entry) = entries.get(&user_id) {
            let _ = entry.tx.send(event);
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.entries.read().await.contains_key(&user_id)
    }

    pub async fn online_ids(&self) -> Vec<Uuid> {
        self.entries.read().await.keys().copied().collect()
    }
}
