//! In-memory room repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    CommitJoinError, JoinCommit, Participant, ParticipantRemoval, RepositoryError, Room, RoomId,
    RoomRepository, Timestamp, User, UserId, policy,
};

/// Room store stand-in backed by a `Mutex`-guarded map. Each method
/// body is one critical section: `commit_join` validates, evicts and
/// appends without any interleaved observer, the in-memory equivalent
/// of a serializable database transaction.
#[derive(Debug, Default)]
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<RoomId, Room>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a room record. Room creation itself belongs to the
    /// surrounding room service.
    pub async fn insert_room(&self, room: Room) {
        let mut rooms = self.rooms.lock().await;
        rooms.insert(room.id.clone(), room);
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn find_room(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(id).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        let mut listing: Vec<Room> = rooms.values().cloned().collect();
        listing.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(listing)
    }

    async fn commit_join(
        &self,
        user: &User,
        room_id: &RoomId,
        secret: Option<String>,
        joined_at: Timestamp,
    ) -> Result<JoinCommit, CommitJoinError> {
        let mut rooms = self.rooms.lock().await;

        let target = rooms.get(room_id).ok_or(CommitJoinError::RoomNotFound)?;
        let admission = policy::validate_join(target, &user.id, secret.as_deref())?;

        // Single-room membership: locate and clear any other room the
        // user currently occupies, inside the same critical section.
        let previous_room = rooms
            .iter()
            .find(|(id, room)| *id != room_id && room.has_participant(&user.id))
            .map(|(id, _)| id.clone());
        if let Some(previous_id) = &previous_room {
            if let Some(previous) = rooms.get_mut(previous_id) {
                previous.remove_participant(&user.id);
                if previous.is_empty() {
                    previous.last_participant_left_at = Some(joined_at);
                }
            }
        }

        let newly_added = matches!(admission, policy::Admission::New);
        let Some(room) = rooms.get_mut(room_id) else {
            return Err(CommitJoinError::RoomNotFound);
        };
        if newly_added {
            room.add_participant(Participant::new(
                user.id.clone(),
                user.display_name.clone(),
                joined_at,
            ));
        }

        Ok(JoinCommit {
            room: room.clone(),
            previous_room,
            newly_added,
        })
    }

    async fn remove_participant(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        left_at: Timestamp,
    ) -> Result<ParticipantRemoval, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.get_mut(room_id) else {
            // The room may have been swept meanwhile; nothing to do.
            return Ok(ParticipantRemoval {
                removed: false,
                room_emptied: false,
            });
        };
        let removed = room.remove_participant(user_id);
        let room_emptied = removed && room.is_empty();
        if room_emptied {
            room.last_participant_left_at = Some(left_at);
        }
        Ok(ParticipantRemoval {
            removed,
            room_emptied,
        })
    }

    async fn delete_abandoned_rooms(&self, cutoff: Timestamp) -> Result<usize, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let before = rooms.len();
        rooms.retain(|_, room| {
            !(room.is_empty()
                && room
                    .last_participant_left_at
                    .is_some_and(|left_at| left_at < cutoff))
        });
        Ok(before - rooms.len())
    }
}
