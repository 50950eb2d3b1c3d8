//! The signaling router: connect, join, relay, screen share and
//! disconnect handling over the in-memory tables and the durable store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::common::time::Clock;
use crate::domain::{
    CommitJoinError, ConnectionId, JoinRejection, MessagePusher, PusherChannel, RoomId,
    RoomRepository, Timestamp, User, UserId, UserRepository,
};

use super::error::SignalingError;
use super::presence::RoomPresence;
use super::protocol::{ParticipantInfo, RelayKind, ServerEvent};
use super::registry::ConnectionRegistry;
use super::screen_share::ScreenShareTracker;

/// The three in-memory tables, mutated together under one lock so every
/// operation's in-memory phase is a single non-interleaved unit of work.
#[derive(Debug, Default)]
struct RelayState {
    registry: ConnectionRegistry,
    presence: RoomPresence,
    screen_shares: ScreenShareTracker,
}

/// One room's cleanup work for a disconnecting connection.
struct Departure {
    room_id: RoomId,
    remaining: Vec<ConnectionId>,
    share_cleared: bool,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Upper bound on any single durable-store call.
    pub store_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(3),
        }
    }
}

/// Behavioral core of the relay.
///
/// Owns the connection registry, the room presence table and the
/// screen-share tracker; collaborates with the durable store through
/// the repository traits and with clients through the message pusher.
/// Instantiable per test case; no ambient globals.
pub struct SignalingRouter {
    state: Mutex<RelayState>,
    users: Arc<dyn UserRepository>,
    rooms: Arc<dyn RoomRepository>,
    pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl SignalingRouter {
    pub fn new(
        users: Arc<dyn UserRepository>,
        rooms: Arc<dyn RoomRepository>,
        pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        config: RouterConfig,
    ) -> Self {
        Self {
            state: Mutex::new(RelayState::default()),
            users,
            rooms,
            pusher,
            clock,
            store_timeout: config.store_timeout,
        }
    }

    /// Accept a new connection: bind its outbound channel and, when an
    /// identity was presented, record it in the registry. A connection
    /// without an identity stays registry-less and every later room
    /// operation from it fails with an authentication error.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        user_id: Option<UserId>,
        sender: PusherChannel,
    ) {
        self.pusher
            .register_connection(connection_id.clone(), sender)
            .await;
        match user_id {
            Some(user_id) => {
                let mut state = self.state.lock().await;
                state.registry.register(connection_id.clone(), user_id.clone());
                tracing::info!("Connection '{}' bound to user '{}'", connection_id, user_id);
            }
            None => {
                tracing::warn!("Connection '{}' opened without a user identifier", connection_id);
            }
        }
    }

    /// Join a room.
    ///
    /// Durable mutations happen first, as one transactional unit; the
    /// in-memory tables are only touched after the commit, so a failed
    /// join leaves nothing to roll back. Side effects on success, in
    /// order: evict the user's connections from any previous room,
    /// seed the joiner with the peer list, participant list and active
    /// sharers, announce the joiner to the room, and refresh the
    /// room-wide connection-to-user map.
    pub async fn join_room(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        secret: Option<String>,
    ) -> Result<(), SignalingError> {
        let (user_id, rejoining) = {
            let state = self.state.lock().await;
            let user_id = state
                .registry
                .lookup(connection_id)
                .cloned()
                .ok_or(SignalingError::AuthenticationRequired)?;
            (user_id, state.presence.contains(room_id, connection_id))
        };

        let user = self.find_user(&user_id).await?;

        let joined_at = Timestamp::new(self.clock.now_millis());
        let commit = match timeout(
            self.store_timeout,
            self.rooms.commit_join(&user, room_id, secret, joined_at),
        )
        .await
        {
            Err(_) => {
                return Err(SignalingError::Transient("room store timed out".to_string()));
            }
            Ok(Err(CommitJoinError::RoomNotFound)) => return Err(SignalingError::RoomNotFound),
            Ok(Err(CommitJoinError::Rejected(JoinRejection::Unauthorized))) => {
                return Err(SignalingError::Unauthorized);
            }
            Ok(Err(CommitJoinError::Rejected(JoinRejection::Full))) => {
                return Err(SignalingError::RoomFull);
            }
            Ok(Err(CommitJoinError::Store(e))) => {
                return Err(SignalingError::Transient(e.to_string()));
            }
            Ok(Ok(commit)) => commit,
        };

        if !commit.newly_added && rejoining {
            // Same connection, same room: the commit above was a no-op,
            // so rejecting here leaves no side effects.
            return Err(SignalingError::AlreadyJoined);
        }

        // In-memory phase, one unit of work. The notification plan is
        // assembled under the lock and delivered after it is released.
        let plan = {
            let mut state = self.state.lock().await;
            let mut plan: Vec<(Vec<ConnectionId>, ServerEvent)> = Vec::new();

            if let Some(previous_room) = commit.previous_room.as_ref() {
                let mut evicted = Vec::new();
                for connection in state.registry.connections_of(&user_id) {
                    if state.presence.contains(previous_room, &connection) {
                        state.presence.remove_from_room(previous_room, &connection);
                        evicted.push(connection);
                    }
                }
                let share_cleared = state.screen_shares.unmark_sharing(previous_room, &user_id);
                let remaining = state.presence.connections(previous_room);
                if share_cleared {
                    plan.push((
                        remaining.clone(),
                        ServerEvent::UserScreenSharingStopped {
                            user_id: user_id.as_str().to_string(),
                        },
                    ));
                }
                for connection in evicted {
                    plan.push((
                        remaining.clone(),
                        ServerEvent::UserLeft {
                            connection_id: connection.as_str().to_string(),
                        },
                    ));
                }
                tracing::info!(
                    "User '{}' moved out of room '{}' into room '{}'",
                    user_id,
                    previous_room,
                    room_id
                );
            }

            state.presence.add_to_room(room_id, connection_id);
            let others = state.presence.others_in(room_id, connection_id);
            let room_connections = state.presence.connections(room_id);

            plan.push((
                vec![connection_id.clone()],
                ServerEvent::AllUsers {
                    users: others.iter().map(|c| c.as_str().to_string()).collect(),
                },
            ));
            plan.push((
                vec![connection_id.clone()],
                ServerEvent::RoomParticipants {
                    participants: commit
                        .room
                        .participants
                        .iter()
                        .map(|p| ParticipantInfo {
                            user_id: p.user_id.as_str().to_string(),
                            display_name: p.display_name.clone(),
                            joined_at: p.joined_at.value(),
                        })
                        .collect(),
                },
            ));
            plan.push((
                others,
                ServerEvent::UserJoined {
                    connection_id: connection_id.as_str().to_string(),
                },
            ));

            let mut mappings = HashMap::new();
            for connection in &room_connections {
                if let Some(bound) = state.registry.lookup(connection) {
                    mappings.insert(
                        connection.as_str().to_string(),
                        bound.as_str().to_string(),
                    );
                }
            }
            plan.push((room_connections, ServerEvent::UserSocketMap { mappings }));

            // Late joiners learn about in-progress screen shares before
            // any handshake traffic reaches them.
            for sharer in state.screen_shares.sharers_of(room_id) {
                if let Some(sharer_connection) =
                    state.registry.connections_of(&sharer).into_iter().next()
                {
                    plan.push((
                        vec![connection_id.clone()],
                        ServerEvent::UserScreenSharingStarted {
                            socket_id: sharer_connection.as_str().to_string(),
                            user_id: sharer.as_str().to_string(),
                        },
                    ));
                }
            }

            plan
        };

        for (targets, event) in plan {
            self.pusher.broadcast(targets, &event.encode()).await;
        }

        tracing::info!(
            "User '{}' joined room '{}' on connection '{}'",
            user_id,
            room_id,
            connection_id
        );
        Ok(())
    }

    /// Forward a handshake payload to exactly one peer. Best-effort: a
    /// target that disconnected meanwhile is logged and dropped; the
    /// initiating peer's own timeout logic handles retry or abandon.
    pub async fn relay(
        &self,
        sender: &ConnectionId,
        target: &ConnectionId,
        kind: RelayKind,
        payload: Value,
    ) {
        let event = kind.into_event(sender.as_str().to_string(), payload);
        if let Err(e) = self.pusher.push_to(target, &event.encode()).await {
            tracing::debug!(
                "Dropping {:?} relay from '{}' to '{}': {}",
                kind,
                sender,
                target,
                e
            );
        }
    }

    /// Mark the connection's user as sharing and announce it to the
    /// rest of the room.
    pub async fn start_screen_share(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), SignalingError> {
        let (user_id, targets) = {
            let mut state = self.state.lock().await;
            let user_id = state
                .registry
                .lookup(connection_id)
                .cloned()
                .ok_or(SignalingError::AuthenticationRequired)?;
            if !state.presence.contains(room_id, connection_id) {
                // A sharer must be present in the room; a stray frame
                // from an unjoined connection is not worth an error.
                tracing::warn!(
                    "Ignoring screen-share start from '{}' for room '{}' it has not joined",
                    connection_id,
                    room_id
                );
                return Ok(());
            }
            state.screen_shares.mark_sharing(room_id, &user_id);
            (user_id, state.presence.others_in(room_id, connection_id))
        };

        let event = ServerEvent::UserScreenSharingStarted {
            socket_id: connection_id.as_str().to_string(),
            user_id: user_id.as_str().to_string(),
        };
        self.pusher.broadcast(targets, &event.encode()).await;
        tracing::info!("User '{}' started screen sharing in room '{}'", user_id, room_id);
        Ok(())
    }

    /// Clear the connection's user share mark and announce it, if a
    /// mark was actually active.
    pub async fn stop_screen_share(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), SignalingError> {
        let (user_id, targets, cleared) = {
            let mut state = self.state.lock().await;
            let user_id = state
                .registry
                .lookup(connection_id)
                .cloned()
                .ok_or(SignalingError::AuthenticationRequired)?;
            let cleared = state.screen_shares.unmark_sharing(room_id, &user_id);
            (user_id, state.presence.others_in(room_id, connection_id), cleared)
        };

        if cleared {
            let event = ServerEvent::UserScreenSharingStopped {
                user_id: user_id.as_str().to_string(),
            };
            self.pusher.broadcast(targets, &event.encode()).await;
            tracing::info!("User '{}' stopped screen sharing in room '{}'", user_id, room_id);
        }
        Ok(())
    }

    /// Tear down a connection. The only operation driven by transport
    /// events rather than client requests; idempotent and safe against
    /// partially inconsistent state.
    ///
    /// In-memory cleanup is unconditional so live notifications stay
    /// correct even when the durable store is unreachable; durable
    /// cleanup is best-effort and self-heals on the next successful
    /// room mutation or the abandoned-room sweep.
    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        let (user_id, departures) = {
            let mut state = self.state.lock().await;
            let user_id = state.registry.lookup(connection_id).cloned();
            let mut departures = Vec::new();
            for room_id in state.presence.rooms_of(connection_id) {
                state.presence.remove_from_room(&room_id, connection_id);
                let share_cleared = match &user_id {
                    Some(user_id) => state.screen_shares.unmark_sharing(&room_id, user_id),
                    None => false,
                };
                departures.push(Departure {
                    remaining: state.presence.connections(&room_id),
                    room_id,
                    share_cleared,
                });
            }
            state.registry.unregister(connection_id);
            (user_id, departures)
        };

        for departure in &departures {
            if departure.share_cleared {
                if let Some(user_id) = &user_id {
                    let event = ServerEvent::UserScreenSharingStopped {
                        user_id: user_id.as_str().to_string(),
                    };
                    self.pusher
                        .broadcast(departure.remaining.clone(), &event.encode())
                        .await;
                }
            }
            let event = ServerEvent::UserLeft {
                connection_id: connection_id.as_str().to_string(),
            };
            self.pusher
                .broadcast(departure.remaining.clone(), &event.encode())
                .await;
        }

        if let Some(user_id) = &user_id {
            let left_at = Timestamp::new(self.clock.now_millis());
            for departure in &departures {
                match timeout(
                    self.store_timeout,
                    self.rooms
                        .remove_participant(&departure.room_id, user_id, left_at),
                )
                .await
                {
                    Err(_) => tracing::warn!(
                        "Timed out removing '{}' from room '{}'; the next room mutation reconciles",
                        user_id,
                        departure.room_id
                    ),
                    Ok(Err(e)) => tracing::warn!(
                        "Failed to remove '{}' from room '{}': {}",
                        user_id,
                        departure.room_id,
                        e
                    ),
                    Ok(Ok(removal)) if removal.room_emptied => {
                        tracing::info!("Room '{}' is now empty", departure.room_id);
                    }
                    Ok(Ok(_)) => {}
                }
            }
        }

        self.pusher.unregister_connection(connection_id).await;
        tracing::info!("Connection '{}' disconnected", connection_id);
    }

    /// Push an error event to the offending connection.
    pub async fn report(&self, connection_id: &ConnectionId, error: &SignalingError) {
        if let Err(e) = self
            .pusher
            .push_to(connection_id, &error.to_event().encode())
            .await
        {
            tracing::debug!("Could not deliver error to '{}': {}", connection_id, e);
        }
    }

    async fn find_user(&self, user_id: &UserId) -> Result<User, SignalingError> {
        match timeout(self.store_timeout, self.users.find_user(user_id)).await {
            Err(_) => Err(SignalingError::Transient("user store timed out".to_string())),
            Ok(Err(e)) => Err(SignalingError::Transient(e.to_string())),
            Ok(Ok(None)) => Err(SignalingError::UserNotFound),
            Ok(Ok(Some(user))) => Ok(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::common::time::FixedClock;
    use crate::domain::repository::{MockRoomRepository, MockUserRepository};
    use crate::domain::{RepositoryError, Room};
    use crate::infrastructure::message_pusher::WebSocketMessagePusher;
    use crate::infrastructure::repository::{InMemoryRoomRepository, InMemoryUserRepository};

    const NOW: i64 = 1_700_000_000_000;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string()).unwrap()
    }

    fn room_id(id: &str) -> RoomId {
        RoomId::new(id.to_string()).unwrap()
    }

    fn user_id(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    async fn seeded_repositories(
        rooms: Vec<Room>,
        users: Vec<User>,
    ) -> (Arc<InMemoryUserRepository>, Arc<InMemoryRoomRepository>) {
        let user_repo = Arc::new(InMemoryUserRepository::new());
        for user in users {
            user_repo.insert_user(user).await;
        }
        let room_repo = Arc::new(InMemoryRoomRepository::new());
        for room in rooms {
            room_repo.insert_room(room).await;
        }
        (user_repo, room_repo)
    }

    fn build_router(
        users: Arc<dyn UserRepository>,
        rooms: Arc<dyn RoomRepository>,
    ) -> SignalingRouter {
        SignalingRouter::new(
            users,
            rooms,
            Arc::new(WebSocketMessagePusher::new()),
            Arc::new(FixedClock::new(NOW)),
            RouterConfig::default(),
        )
    }

    async fn connect(
        router: &SignalingRouter,
        connection: &str,
        user: Option<&str>,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        router
            .connect(conn(connection), user.map(user_id), tx)
            .await;
        rx
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        let raw = rx.try_recv().expect("expected a pending event");
        serde_json::from_str(&raw).expect("event is valid JSON")
    }

    fn test_user(id: &str) -> User {
        User {
            id: user_id(id),
            display_name: id.to_string(),
        }
    }

    fn test_room(id: &str, capacity: usize) -> Room {
        Room::new(room_id(id), id.to_string(), capacity, Timestamp::new(NOW))
    }

    #[tokio::test]
    async fn join_without_an_identity_fails_with_authentication_required() {
        let (users, rooms) = seeded_repositories(vec![test_room("r1", 4)], vec![]).await;
        let router = build_router(users, rooms);
        let _rx = connect(&router, "c1", None).await;

        let result = router.join_room(&conn("c1"), &room_id("r1"), None).await;

        assert_eq!(result, Err(SignalingError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn join_an_unknown_room_fails_with_room_not_found() {
        let (users, rooms) = seeded_repositories(vec![], vec![test_user("alice")]).await;
        let router = build_router(users, rooms);
        let _rx = connect(&router, "c1", Some("alice")).await;

        let result = router.join_room(&conn("c1"), &room_id("nope"), None).await;

        assert_eq!(result, Err(SignalingError::RoomNotFound));
    }

    #[tokio::test]
    async fn join_with_an_unknown_user_fails_with_user_not_found() {
        let (users, rooms) = seeded_repositories(vec![test_room("r1", 4)], vec![]).await;
        let router = build_router(users, rooms);
        let _rx = connect(&router, "c1", Some("ghost")).await;

        let result = router.join_room(&conn("c1"), &room_id("r1"), None).await;

        assert_eq!(result, Err(SignalingError::UserNotFound));
    }

    #[tokio::test]
    async fn joiner_receives_peer_list_participants_and_socket_map() {
        let (users, rooms) = seeded_repositories(
            vec![test_room("r1", 4)],
            vec![test_user("alice"), test_user("bob")],
        )
        .await;
        let router = build_router(users, rooms);
        let mut alice_rx = connect(&router, "c1", Some("alice")).await;
        let mut bob_rx = connect(&router, "c2", Some("bob")).await;

        router
            .join_room(&conn("c1"), &room_id("r1"), None)
            .await
            .unwrap();
        router
            .join_room(&conn("c2"), &room_id("r1"), None)
            .await
            .unwrap();

        // Bob's bootstrap sequence.
        let all_users = next_event(&mut bob_rx);
        assert_eq!(all_users["type"], "all-users");
        assert_eq!(all_users["users"], json!(["c1"]));

        let participants = next_event(&mut bob_rx);
        assert_eq!(participants["type"], "room-participants");
        assert_eq!(participants["participants"].as_array().unwrap().len(), 2);

        let socket_map = next_event(&mut bob_rx);
        assert_eq!(socket_map["type"], "user-socket-map");
        assert_eq!(socket_map["mappings"]["c1"], "alice");
        assert_eq!(socket_map["mappings"]["c2"], "bob");

        // Alice saw her own bootstrap, then bob's arrival.
        assert_eq!(next_event(&mut alice_rx)["type"], "all-users");
        assert_eq!(next_event(&mut alice_rx)["type"], "room-participants");
        assert_eq!(next_event(&mut alice_rx)["type"], "user-socket-map");
        let joined = next_event(&mut alice_rx);
        assert_eq!(joined["type"], "user-joined");
        assert_eq!(joined["connectionId"], "c2");
    }

    #[tokio::test]
    async fn rejoining_on_the_same_connection_fails_with_already_joined() {
        let (users, rooms) =
            seeded_repositories(vec![test_room("r1", 4)], vec![test_user("alice")]).await;
        let rooms_probe = rooms.clone();
        let router = build_router(users, rooms);
        let _rx = connect(&router, "c1", Some("alice")).await;

        router
            .join_room(&conn("c1"), &room_id("r1"), None)
            .await
            .unwrap();
        let result = router.join_room(&conn("c1"), &room_id("r1"), None).await;

        assert_eq!(result, Err(SignalingError::AlreadyJoined));
        let room = rooms_probe.find_room(&room_id("r1")).await.unwrap().unwrap();
        assert_eq!(room.participants.len(), 1);
    }

    #[tokio::test]
    async fn a_fresh_connection_of_a_member_rejoins_idempotently() {
        let (users, rooms) =
            seeded_repositories(vec![test_room("r1", 4)], vec![test_user("alice")]).await;
        let rooms_probe = rooms.clone();
        let router = build_router(users, rooms);
        let _rx1 = connect(&router, "c1", Some("alice")).await;
        let _rx2 = connect(&router, "c2", Some("alice")).await;

        router
            .join_room(&conn("c1"), &room_id("r1"), None)
            .await
            .unwrap();
        router
            .join_room(&conn("c2"), &room_id("r1"), None)
            .await
            .unwrap();

        // One durable record, two live connections.
        let room = rooms_probe.find_room(&room_id("r1")).await.unwrap().unwrap();
        assert_eq!(room.participants.len(), 1);
        let state = router.state.lock().await;
        assert_eq!(
            state.presence.connections(&room_id("r1")),
            vec![conn("c1"), conn("c2")]
        );
    }

    #[tokio::test]
    async fn a_transient_store_failure_aborts_the_join_without_side_effects() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_user()
            .returning(|id| Ok(Some(User {
                id: id.clone(),
                display_name: "Alice".to_string(),
            })));
        let mut rooms = MockRoomRepository::new();
        rooms.expect_commit_join().returning(|_, _, _, _| {
            Err(CommitJoinError::Store(RepositoryError::Unavailable(
                "store is down".to_string(),
            )))
        });
        let router = build_router(Arc::new(users), Arc::new(rooms));
        let _rx = connect(&router, "c1", Some("alice")).await;

        let result = router.join_room(&conn("c1"), &room_id("r1"), None).await;

        assert!(matches!(result, Err(SignalingError::Transient(_))));
        let state = router.state.lock().await;
        assert!(state.presence.is_empty(&room_id("r1")));
    }

    #[tokio::test]
    async fn relay_to_a_vanished_target_is_silent_and_non_fatal() {
        let (users, rooms) =
            seeded_repositories(vec![test_room("r1", 4)], vec![test_user("alice")]).await;
        let router = build_router(users, rooms);
        let _rx = connect(&router, "c1", Some("alice")).await;

        router
            .relay(&conn("c1"), &conn("gone"), RelayKind::Offer, json!({"sdp": "v=0"}))
            .await;

        // The sender's subsequent operations still work.
        router
            .join_room(&conn("c1"), &room_id("r1"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_even_for_unknown_connections() {
        let (users, rooms) = seeded_repositories(vec![], vec![]).await;
        let router = build_router(users, rooms);

        router.disconnect(&conn("never-seen")).await;
        router.disconnect(&conn("never-seen")).await;
    }

    #[tokio::test]
    async fn durable_failure_during_disconnect_still_cleans_memory() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_user()
            .returning(|id| Ok(Some(User {
                id: id.clone(),
                display_name: "Alice".to_string(),
            })));
        let mut rooms = MockRoomRepository::new();
        rooms.expect_commit_join().returning(|user, target, _, joined_at| {
            let mut room = Room::new(
                target.clone(),
                "r1".to_string(),
                4,
                Timestamp::new(NOW),
            );
            room.add_participant(crate::domain::Participant::new(
                user.id.clone(),
                user.display_name.clone(),
                joined_at,
            ));
            Ok(crate::domain::JoinCommit {
                room,
                previous_room: None,
                newly_added: true,
            })
        });
        rooms
            .expect_remove_participant()
            .returning(|_, _, _| Err(RepositoryError::Unavailable("store is down".to_string())));
        let router = build_router(Arc::new(users), Arc::new(rooms));
        let _rx = connect(&router, "c1", Some("alice")).await;
        router
            .join_room(&conn("c1"), &room_id("r1"), None)
            .await
            .unwrap();

        router.disconnect(&conn("c1")).await;

        let state = router.state.lock().await;
        assert!(state.presence.is_empty(&room_id("r1")));
        assert_eq!(state.registry.lookup(&conn("c1")), None);
    }
}
