/// In-memory connection registry behind one gateway
///
/// Every open socket registers a [`Connection`] keyed by a fresh connection
/// id and receives events through an unbounded channel drained by its
/// session task. Delivery is best effort: there is no acknowledgement and
/// no replay for clients that were offline.
///
/// # Example
///
/// ```
/// use planboard_api::realtime::hub::ConnectionHub;
/// use planboard_api::realtime::RealtimeEvent;
/// use uuid::Uuid;
///
/// # async fn example(event: RealtimeEvent) {
/// let hub = ConnectionHub::new("notifications");
/// let user_id = Uuid::new_v4();
///
/// let (_conn_id, mut rx) = hub.register(user_id, false).await;
/// hub.send_to_user(user_id, &event).await;
///
/// let frame = rx.recv().await;
/// assert!(frame.is_some());
/// # }
/// ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::RealtimeEvent;

/// One open socket
#[derive(Debug)]
pub struct Connection {
    pub user_id: Uuid,
    pub is_admin: bool,
    sender: mpsc::UnboundedSender<String>,
}

/// Shared connection map; cloning shares the same map
#[derive(Debug, Clone)]
pub struct ConnectionHub {
    name: &'static str,
    connections: Arc<RwLock<HashMap<Uuid, Connection>>>,
}

impl ConnectionHub {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a connection and returns its id with the frame receiver
    pub async fn register(
        &self,
        user_id: Uuid,
        is_admin: bool,
    ) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();

        let mut connections = self.connections.write().await;
        connections.insert(
            conn_id,
            Connection {
                user_id,
                is_admin,
                sender,
            },
        );

        tracing::debug!(
            gateway = self.name,
            %conn_id,
            %user_id,
            is_admin,
            connections = connections.len(),
            "Client connected"
        );

        (conn_id, receiver)
    }

    /// Removes a connection; unknown ids are ignored
    pub async fn unregister(&self, conn_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.remove(&conn_id) {
            tracing::debug!(
                gateway = self.name,
                %conn_id,
                user_id = %conn.user_id,
                connections = connections.len(),
                "Client disconnected"
            );
        }
    }

    /// Sends an event to every connection of `user_id`
    ///
    /// # Returns
    ///
    /// Number of connections the event was queued for
    pub async fn send_to_user(&self, user_id: Uuid, event: &RealtimeEvent) -> usize {
        self.send_where(event, |conn| conn.user_id == user_id).await
    }

    /// Sends an event to every admin-flagged connection
    pub async fn broadcast_admins(&self, event: &RealtimeEvent) -> usize {
        self.send_where(event, |conn| conn.is_admin).await
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn send_where<F>(&self, event: &RealtimeEvent, matches: F) -> usize
    where
        F: Fn(&Connection) -> bool,
    {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(gateway = self.name, error = %e, "Failed to encode event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let connections = self.connections.read().await;
            for (conn_id, conn) in connections.iter().filter(|(_, conn)| matches(conn)) {
                if conn.sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*conn_id);
                }
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            for conn_id in &dead {
                connections.remove(conn_id);
            }
            tracing::debug!(gateway = self.name, pruned = dead.len(), "Pruned closed connections");
        }

        delivered
    }
}
