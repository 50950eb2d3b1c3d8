//! DTOs of the read-only HTTP API.

use serde::Serialize;

use crate::common::time::millis_to_rfc3339;
use crate::domain::{Participant, Room};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub participants: Vec<String>,
    pub created_at: String,
}

impl From<&Room> for RoomSummaryDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            name: room.name.clone(),
            is_private: room.is_private,
            participants: room
                .participants
                .iter()
                .map(|p| p.user_id.as_str().to_string())
                .collect(),
            created_at: millis_to_rfc3339(room.created_at.value()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDetailDto {
    pub user_id: String,
    pub display_name: String,
    pub joined_at: String,
}

impl From<&Participant> for ParticipantDetailDto {
    fn from(participant: &Participant) -> Self {
        Self {
            user_id: participant.user_id.as_str().to_string(),
            display_name: participant.display_name.clone(),
            joined_at: millis_to_rfc3339(participant.joined_at.value()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailDto {
    pub id: String,
    pub name: String,
    pub max_participants: usize,
    pub is_private: bool,
    pub participants: Vec<ParticipantDetailDto>,
    pub created_at: String,
    pub last_participant_left_at: Option<String>,
}

impl From<&Room> for RoomDetailDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            name: room.name.clone(),
            max_participants: room.max_participants,
            is_private: room.is_private,
            participants: room.participants.iter().map(Into::into).collect(),
            created_at: millis_to_rfc3339(room.created_at.value()),
            last_participant_left_at: room
                .last_participant_left_at
                .map(|t| millis_to_rfc3339(t.value())),
        }
    }
}
