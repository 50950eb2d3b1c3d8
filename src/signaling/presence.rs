//! Room presence table.

use std::collections::HashMap;

use crate::domain::{ConnectionId, RoomId};

/// Maps each room to the connections currently joined to it, in
/// insertion order. A shadow of the durable participant list for
/// connections that are still open; divergence is only transient during
/// the join/leave protocol.
#[derive(Debug, Default)]
pub struct RoomPresence {
    rooms: HashMap<RoomId, Vec<ConnectionId>>,
}

impl RoomPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: adding a connection that is already present is a
    /// no-op.
    pub fn add_to_room(&mut self, room_id: &RoomId, connection_id: &ConnectionId) {
        let members = self.rooms.entry(room_id.clone()).or_default();
        if !members.contains(connection_id) {
            members.push(connection_id.clone());
        }
    }

    /// Idempotent: removing an absent connection is a no-op. Empty
    /// entries are dropped so the table never leaks room keys.
    pub fn remove_from_room(&mut self, room_id: &RoomId, connection_id: &ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.retain(|member| member != connection_id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }

    pub fn contains(&self, room_id: &RoomId, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(connection_id))
    }

    /// Connections in the room, insertion order.
    pub fn connections(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms.get(room_id).cloned().unwrap_or_default()
    }

    /// Peer list a new joiner needs to initiate handshakes, insertion
    /// order.
    pub fn others_in(&self, room_id: &RoomId, excluding: &ConnectionId) -> Vec<ConnectionId> {
        self.connections(room_id)
            .into_iter()
            .filter(|member| member != excluding)
            .collect()
    }

    /// Rooms the connection is present in. Steady state is at most one;
    /// disconnect cleanup tolerates more.
    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|(_, members)| members.contains(connection_id))
            .map(|(room_id, _)| room_id.clone())
            .collect()
    }

    pub fn is_empty(&self, room_id: &RoomId) -> bool {
        !self.rooms.contains_key(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string()).unwrap()
    }

    #[test]
    fn add_is_idempotent_and_keeps_insertion_order() {
        let mut presence = RoomPresence::new();

        presence.add_to_room(&room("r1"), &conn("c1"));
        presence.add_to_room(&room("r1"), &conn("c2"));
        presence.add_to_room(&room("r1"), &conn("c1"));

        assert_eq!(presence.connections(&room("r1")), vec![conn("c1"), conn("c2")]);
    }

    #[test]
    fn remove_is_idempotent_and_drops_empty_entries() {
        let mut presence = RoomPresence::new();
        presence.add_to_room(&room("r1"), &conn("c1"));

        presence.remove_from_room(&room("r1"), &conn("c1"));
        presence.remove_from_room(&room("r1"), &conn("c1"));

        assert!(presence.is_empty(&room("r1")));
    }

    #[test]
    fn others_in_excludes_the_given_connection() {
        let mut presence = RoomPresence::new();
        presence.add_to_room(&room("r1"), &conn("c1"));
        presence.add_to_room(&room("r1"), &conn("c2"));
        presence.add_to_room(&room("r1"), &conn("c3"));

        let others = presence.others_in(&room("r1"), &conn("c2"));

        assert_eq!(others, vec![conn("c1"), conn("c3")]);
    }

    #[test]
    fn rooms_of_reports_every_room_holding_the_connection() {
        let mut presence = RoomPresence::new();
        presence.add_to_room(&room("r1"), &conn("c1"));
        presence.add_to_room(&room("r2"), &conn("c1"));

        let mut rooms = presence.rooms_of(&conn("c1"));
        rooms.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        assert_eq!(rooms, vec![room("r1"), room("r2")]);
    }

    #[test]
    fn an_unknown_room_is_empty() {
        let presence = RoomPresence::new();

        assert!(presence.is_empty(&room("nope")));
        assert!(presence.connections(&room("nope")).is_empty());
    }
}
