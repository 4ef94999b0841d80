use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

use resona_core::types::DbId;
use resona_db::models::Job;
use resona_events::JobUpdateSink;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Owner-keyed registry of live WebSocket connections.
///
/// Each owner maps to the set of their open connections (one browser tab
/// each). Thread-safe via interior `RwLock`; designed to be wrapped in
/// `Arc` and shared across the application.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<DbId, HashMap<String, WsSender>>>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection under its authenticated owner.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn register(
        &self,
        owner_id: DbId,
        conn_id: String,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .write()
            .await
            .entry(owner_id)
            .or_default()
            .insert(conn_id, tx);
        rx
    }

    /// Remove a connection. The owner's entry is pruned once its last
    /// connection is gone, so the registry never accumulates empty sets.
    pub async fn unregister(&self, owner_id: DbId, conn_id: &str) {
        let mut owners = self.connections.write().await;
        if let Some(conns) = owners.get_mut(&owner_id) {
            conns.remove(conn_id);
            if conns.is_empty() {
                owners.remove(&owner_id);
            }
        }
    }

    /// Push a `job.update` envelope to every connection owned by `owner_id`.
    ///
    /// A connection whose channel is closed is removed from the registry;
    /// the remaining connections still receive the message. Returns the
    /// number of connections the message was sent to.
    pub async fn broadcast_job(&self, owner_id: DbId, job: &Job) -> usize {
        let payload = serde_json::json!({
            "type": "job.update",
            "job": job,
        })
        .to_string();
        let message = Message::Text(payload.into());

        let mut owners = self.connections.write().await;
        let Some(conns) = owners.get_mut(&owner_id) else {
            return 0;
        };

        let mut sent = 0;
        conns.retain(|conn_id, sender| match sender.send(message.clone()) {
            Ok(()) => {
                sent += 1;
                true
            }
            Err(_) => {
                tracing::debug!(conn_id = %conn_id, "Dropping closed WebSocket connection");
                false
            }
        });

        if conns.is_empty() {
            owners.remove(&owner_id);
        }

        sent
    }

    /// Return the number of owners with at least one live connection.
    pub async fn owner_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Return the total number of live connections across all owners.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.values().map(HashMap::len).sum()
    }

    /// Send a Close frame to every connection, then clear the registry.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut owners = self.connections.write().await;
        let count: usize = owners.values().map(HashMap::len).sum();
        for conns in owners.values() {
            for sender in conns.values() {
                let _ = sender.send(Message::Close(None));
            }
        }
        owners.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobUpdateSink for ConnectionRegistry {
    async fn deliver(&self, owner_id: DbId, job: &Job) {
        let sent = self.broadcast_job(owner_id, job).await;
        tracing::debug!(
            job_id = %job.id,
            owner_id = %owner_id,
            sent,
            "Delivered job update"
        );
    }
}
