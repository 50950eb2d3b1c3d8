//! Wire protocol of the signaling channel.
//!
//! Every frame is a JSON object tagged with `type` (kebab-case event
//! name, camelCase fields). Handshake payloads (SDP offers/answers, ICE
//! candidates) are carried opaquely: the relay never interprets them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-to-server events.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        room_id: String,
        /// Shared credential for private rooms.
        #[serde(default)]
        secret: Option<String>,
    },
    Offer {
        target: String,
        offer: Value,
    },
    Answer {
        target: String,
        answer: Value,
    },
    IceCandidate {
        target: String,
        candidate: Value,
    },
    ScreenOffer {
        target: String,
        offer: Value,
    },
    ScreenAnswer {
        target: String,
        answer: Value,
    },
    ScreenIceCandidate {
        target: String,
        candidate: Value,
    },
    ScreenSharingStarted {
        room_id: String,
    },
    ScreenSharingStopped {
        room_id: String,
    },
}

/// Participant entry as sent to a joining connection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub user_id: String,
    pub display_name: String,
    pub joined_at: i64,
}

/// Server-to-client events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Peer connections already in the room; sent to the joiner only.
    AllUsers { users: Vec<String> },
    /// Durable participant list of the room; sent to the joiner only.
    RoomParticipants { participants: Vec<ParticipantInfo> },
    UserJoined { connection_id: String },
    UserLeft { connection_id: String },
    /// Connection-to-user mapping for the whole room.
    UserSocketMap { mappings: HashMap<String, String> },
    UserScreenSharingStarted { socket_id: String, user_id: String },
    UserScreenSharingStopped { user_id: String },
    Offer { sender: String, offer: Value },
    Answer { sender: String, answer: Value },
    IceCandidate { sender: String, candidate: Value },
    ScreenOffer { sender: String, offer: Value },
    ScreenAnswer { sender: String, answer: Value },
    ScreenIceCandidate { sender: String, candidate: Value },
    Error { code: &'static str, message: String },
}

impl ServerEvent {
    /// Encode for the wire. Our own enum always serializes.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("server event serializes to JSON")
    }
}

/// The six handshake message kinds the relay forwards 1:1: camera and
/// screen channels each carry offer, answer and ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    Offer,
    Answer,
    IceCandidate,
    ScreenOffer,
    ScreenAnswer,
    ScreenIceCandidate,
}

impl RelayKind {
    /// Wrap a relayed payload into the event delivered to the target,
    /// stamped with the sender's connection id.
    pub fn into_event(self, sender: String, payload: Value) -> ServerEvent {
        match self {
            RelayKind::Offer => ServerEvent::Offer {
                sender,
                offer: payload,
            },
            RelayKind::Answer => ServerEvent::Answer {
                sender,
                answer: payload,
            },
            RelayKind::IceCandidate => ServerEvent::IceCandidate {
                sender,
                candidate: payload,
            },
            RelayKind::ScreenOffer => ServerEvent::ScreenOffer {
                sender,
                offer: payload,
            },
            RelayKind::ScreenAnswer => ServerEvent::ScreenAnswer {
                sender,
                answer: payload,
            },
            RelayKind::ScreenIceCandidate => ServerEvent::ScreenIceCandidate {
                sender,
                candidate: payload,
            },
        }
    }
}
