//! Domain-level error types.

use thiserror::Error;

/// Rejection of an identifier value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidId {
    #[error("identifier must not be empty")]
    Empty,
}

/// Outcome of the pure join policy when a user may not enter a room.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinRejection {
    #[error("not authorized to join this private room")]
    Unauthorized,
    #[error("room is full")]
    Full,
}

/// Failure of the durable store itself, as opposed to a policy rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
