//! Shared application state.

use std::sync::Arc;

use crate::domain::RoomRepository;
use crate::signaling::SignalingRouter;

/// State handed to every handler.
pub struct AppState {
    /// The signaling core.
    pub router: Arc<SignalingRouter>,
    /// Read-only room access for the HTTP endpoints.
    pub rooms: Arc<dyn RoomRepository>,
}
