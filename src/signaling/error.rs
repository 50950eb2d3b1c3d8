//! Failure taxonomy for room operations.

use thiserror::Error;

use super::protocol::ServerEvent;

/// Errors reported to the requesting connection as an `error` event.
/// Every variant except [`SignalingError::Transient`] is terminal for
/// the request and leaves no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// The connection never presented a user identifier.
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("user not found")]
    UserNotFound,
    #[error("room not found")]
    RoomNotFound,
    #[error("not authorized to join this private room")]
    Unauthorized,
    #[error("room is full")]
    RoomFull,
    /// This connection is already joined to this exact room. A fresh
    /// connection of the same user is not an error.
    #[error("already joined this room")]
    AlreadyJoined,
    /// The durable store timed out or is unavailable; the request may
    /// be retried unchanged.
    #[error("temporarily unavailable: {0}")]
    Transient(String),
}

impl SignalingError {
    /// Stable error class carried on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication-required",
            Self::UserNotFound => "user-not-found",
            Self::RoomNotFound => "room-not-found",
            Self::Unauthorized => "unauthorized",
            Self::RoomFull => "room-full",
            Self::AlreadyJoined => "already-joined",
            Self::Transient(_) => "transient",
        }
    }

    /// Whether the client may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(SignalingError::Transient("store down".to_string()).is_retryable());
        assert!(!SignalingError::RoomFull.is_retryable());
        assert!(!SignalingError::Unauthorized.is_retryable());
    }

    #[test]
    fn error_events_carry_the_stable_code() {
        let encoded = SignalingError::RoomFull.to_event().encode();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "room-full");
        assert_eq!(value["message"], "room is full");
    }
}
