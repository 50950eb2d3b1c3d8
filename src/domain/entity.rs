//! Durable entities the relay reads and writes.
//!
//! Users and rooms are owned by the surrounding CRUD services; only the
//! fields the relay touches are modeled here.

use super::value_object::{RoomId, Timestamp, UserId};

/// One entry of a room's durable participant list.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: UserId,
    /// Stored alongside the id so room listings need no user lookup.
    pub display_name: String,
    pub joined_at: Timestamp,
}

impl Participant {
    pub fn new(user_id: UserId, display_name: String, joined_at: Timestamp) -> Self {
        Self {
            user_id,
            display_name,
            joined_at,
        }
    }
}

/// The slice of a user record the relay needs.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
}

/// Durable room record.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub max_participants: usize,
    pub is_private: bool,
    /// Users allowed into a private room.
    pub allowed_users: Vec<UserId>,
    /// Shared credential that also unlocks a private room.
    pub secret: Option<String>,
    pub participants: Vec<Participant>,
    /// Set on every non-empty to empty transition of the participant
    /// list; drives the abandoned-room sweep.
    pub last_participant_left_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Room {
    /// Create a public room with an empty participant list.
    pub fn new(id: RoomId, name: String, max_participants: usize, created_at: Timestamp) -> Self {
        Self {
            id,
            name,
            max_participants,
            is_private: false,
            allowed_users: Vec::new(),
            secret: None,
            participants: Vec::new(),
            last_participant_left_at: None,
            created_at,
        }
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn has_participant(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| &p.user_id == user_id)
    }

    /// Append a participant record. Capacity and access checks live in
    /// [`crate::domain::policy::validate_join`]; this only guards the
    /// at-most-once invariant of the list.
    pub fn add_participant(&mut self, participant: Participant) {
        if !self.has_participant(&participant.user_id) {
            self.participants.push(participant);
        }
    }

    /// Remove the user's participant record. Returns whether a record
    /// was actually removed.
    pub fn remove_participant(&mut self, user_id: &UserId) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| &p.user_id != user_id);
        self.participants.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room(max_participants: usize) -> Room {
        Room::new(
            RoomId::new("r1".to_string()).unwrap(),
            "rust-hangout".to_string(),
            max_participants,
            Timestamp::new(1000),
        )
    }

    fn participant(user: &str) -> Participant {
        Participant::new(
            UserId::new(user.to_string()).unwrap(),
            user.to_string(),
            Timestamp::new(2000),
        )
    }

    #[test]
    fn room_is_full_at_capacity() {
        let mut room = test_room(2);

        room.add_participant(participant("alice"));
        assert!(!room.is_full());

        room.add_participant(participant("bob"));
        assert!(room.is_full());
    }

    #[test]
    fn add_participant_is_idempotent_per_user() {
        let mut room = test_room(5);

        room.add_participant(participant("alice"));
        room.add_participant(participant("alice"));

        assert_eq!(room.participants.len(), 1);
    }

    #[test]
    fn remove_participant_reports_whether_a_record_was_removed() {
        let mut room = test_room(5);
        room.add_participant(participant("alice"));

        let alice = UserId::new("alice".to_string()).unwrap();
        assert!(room.remove_participant(&alice));
        assert!(!room.remove_participant(&alice));
        assert!(room.is_empty());
    }
}
