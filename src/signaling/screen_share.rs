//! Screen-share presence tracker.

use std::collections::{HashMap, HashSet};

use crate::domain::{RoomId, UserId};

/// Tracks which users are currently sharing their screen, per room.
/// Answers "who is sharing" for late joiners; never consulted for
/// access control. A user is only marked while one of their connections
/// is present in the same room.
#[derive(Debug, Default)]
pub struct ScreenShareTracker {
    sharers: HashMap<RoomId, HashSet<UserId>>,
}

impl ScreenShareTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_sharing(&mut self, room_id: &RoomId, user_id: &UserId) {
        self.sharers
            .entry(room_id.clone())
            .or_default()
            .insert(user_id.clone());
    }

    /// Clear the user's mark. Returns whether an active mark was
    /// cleared, so callers only broadcast a stop when state changed.
    pub fn unmark_sharing(&mut self, room_id: &RoomId, user_id: &UserId) -> bool {
        let Some(room_sharers) = self.sharers.get_mut(room_id) else {
            return false;
        };
        let cleared = room_sharers.remove(user_id);
        if room_sharers.is_empty() {
            self.sharers.remove(room_id);
        }
        cleared
    }

    /// Users currently sharing in the room, sorted for deterministic
    /// replay order.
    pub fn sharers_of(&self, room_id: &RoomId) -> Vec<UserId> {
        let mut sharers: Vec<UserId> = self
            .sharers
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        sharers.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        sharers
    }

    pub fn is_sharing(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.sharers
            .get(room_id)
            .is_some_and(|set| set.contains(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[test]
    fn marked_users_show_up_for_late_joiners() {
        let mut tracker = ScreenShareTracker::new();

        tracker.mark_sharing(&room("r1"), &user("bob"));
        tracker.mark_sharing(&room("r1"), &user("alice"));

        assert_eq!(tracker.sharers_of(&room("r1")), vec![user("alice"), user("bob")]);
        assert!(tracker.is_sharing(&room("r1"), &user("alice")));
        assert!(!tracker.is_sharing(&room("r2"), &user("alice")));
    }

    #[test]
    fn unmark_reports_whether_a_mark_was_cleared() {
        let mut tracker = ScreenShareTracker::new();
        tracker.mark_sharing(&room("r1"), &user("alice"));

        assert!(tracker.unmark_sharing(&room("r1"), &user("alice")));
        assert!(!tracker.unmark_sharing(&room("r1"), &user("alice")));
        assert!(!tracker.unmark_sharing(&room("r2"), &user("alice")));
    }

    #[test]
    fn marks_are_scoped_per_room() {
        let mut tracker = ScreenShareTracker::new();
        tracker.mark_sharing(&room("r1"), &user("alice"));
        tracker.mark_sharing(&room("r2"), &user("alice"));

        tracker.unmark_sharing(&room("r1"), &user("alice"));

        assert!(tracker.sharers_of(&room("r1")).is_empty());
        assert_eq!(tracker.sharers_of(&room("r2")), vec![user("alice")]);
    }
}
