//! Room-based WebRTC signaling relay.
//!
//! This library tracks which live connections belong to which room and
//! application user, relays offer/answer/ICE handshake payloads between
//! peers, and keeps durable room membership consistent with transient
//! presence as connections come and go.

// layers
pub mod domain;
pub mod infrastructure;
pub mod signaling;
pub mod ui;

// shared library
pub mod common;
