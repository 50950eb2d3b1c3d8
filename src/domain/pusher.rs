//! Message delivery abstraction.
//!
//! The signaling core pushes already-encoded events through this trait;
//! the WebSocket implementation lives in the infrastructure layer.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::value_object::ConnectionId;

/// Channel through which one connection receives outbound messages.
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[derive(Debug, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(String),
    #[error("push failed: {0}")]
    PushFailed(String),
}

#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Bind an outbound channel to a connection.
    async fn register_connection(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// Drop a connection's channel. Idempotent.
    async fn unregister_connection(&self, connection_id: &ConnectionId);

    /// Deliver to a single connection.
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// Best-effort delivery to several connections; targets that are
    /// gone are skipped.
    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str);
}
