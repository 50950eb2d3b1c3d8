//! WebSocket-backed message pusher.
//!
//! Owns the per-connection `UnboundedSender` halves; the UI layer
//! creates the channels when a socket is accepted and feeds the
//! receiver halves into each connection's send loop. Delivery and
//! socket handling stay separate this way.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel};

#[derive(Debug, Default)]
pub struct WebSocketMessagePusher {
    connections: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut connections = self.connections.lock().await;
        connections.insert(connection_id.clone(), sender);
        tracing::debug!("Connection '{}' registered with pusher", connection_id);
    }

    async fn unregister_connection(&self, connection_id: &ConnectionId) {
        let mut connections = self.connections.lock().await;
        connections.remove(connection_id);
        tracing::debug!("Connection '{}' unregistered from pusher", connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let connections = self.connections.lock().await;
        let Some(sender) = connections.get(connection_id) else {
            return Err(MessagePushError::ConnectionNotFound(
                connection_id.as_str().to_string(),
            ));
        };
        sender
            .send(content.to_string())
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) {
        let connections = self.connections.lock().await;
        for target in targets {
            match connections.get(&target) {
                Some(sender) => {
                    if let Err(e) = sender.send(content.to_string()) {
                        tracing::warn!("Failed to push to connection '{}': {}", target, e);
                    }
                }
                None => {
                    tracing::debug!("Skipping vanished connection '{}' during broadcast", target);
                }
            }
        }
    }
}
