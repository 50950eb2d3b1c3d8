//! The behavioral core of the relay: in-memory connection/presence/
//! screen-share state, the wire protocol, and the router that
//! orchestrates them against the durable store.

pub mod error;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod screen_share;
pub mod sweep;

pub use error::SignalingError;
pub use router::{RouterConfig, SignalingRouter};
