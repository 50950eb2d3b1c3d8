//! Connection-to-user registry.

use std::collections::HashMap;

use crate::domain::{ConnectionId, UserId};

/// Maps each live connection to the user identity presented at connect
/// time. Pure in-memory state: connections do not survive a restart, so
/// neither does the registry.
///
/// A connection that presented no identity is simply absent here, and
/// every room operation from it fails with an authentication error.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    bindings: HashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the binding. Called once per connection lifetime,
    /// immediately after transport accept.
    pub fn register(&mut self, connection_id: ConnectionId, user_id: UserId) {
        self.bindings.insert(connection_id, user_id);
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<&UserId> {
        self.bindings.get(connection_id)
    }

    /// Idempotent.
    pub fn unregister(&mut self, connection_id: &ConnectionId) {
        self.bindings.remove(connection_id);
    }

    /// All live connections bound to the given user. Used to resolve a
    /// screen sharer's connection and to evict a user's connections
    /// when single-room membership moves them.
    pub fn connections_of(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.bindings
            .iter()
            .filter(|(_, bound)| *bound == user_id)
            .map(|(connection_id, _)| connection_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string()).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    #[test]
    fn lookup_returns_the_registered_user() {
        let mut registry = ConnectionRegistry::new();

        registry.register(conn("c1"), user("alice"));

        assert_eq!(registry.lookup(&conn("c1")), Some(&user("alice")));
        assert_eq!(registry.lookup(&conn("c2")), None);
    }

    #[test]
    fn unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        registry.register(conn("c1"), user("alice"));

        registry.unregister(&conn("c1"));
        registry.unregister(&conn("c1"));

        assert_eq!(registry.lookup(&conn("c1")), None);
    }

    #[test]
    fn connections_of_finds_every_connection_of_a_user() {
        let mut registry = ConnectionRegistry::new();
        registry.register(conn("c1"), user("alice"));
        registry.register(conn("c2"), user("alice"));
        registry.register(conn("c3"), user("bob"));

        let mut connections = registry.connections_of(&user("alice"));
        connections.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        assert_eq!(connections, vec![conn("c1"), conn("c2")]);
    }
}
