//! UI layer: the axum HTTP/WebSocket surface.

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use server::Server;
