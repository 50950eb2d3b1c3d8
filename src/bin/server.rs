//! Room signaling relay server.
//!
//! Accepts WebSocket connections, relays WebRTC handshake messages
//! between room peers, and keeps durable room membership in step with
//! live presence.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin peerwave-server
//! cargo run --bin peerwave-server -- --host 0.0.0.0 --port 3000
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;

use peerwave::{
    common::{logger::setup_logger, time::SystemClock},
    domain::{Room, RoomId, Timestamp, User, UserId},
    infrastructure::{
        message_pusher::WebSocketMessagePusher,
        repository::{InMemoryRoomRepository, InMemoryUserRepository},
    },
    signaling::{
        RouterConfig, SignalingRouter,
        sweep::{RoomSweeper, SweepConfig},
    },
    ui::Server,
};

#[derive(Parser, Debug)]
#[command(name = "peerwave-server")]
#[command(about = "Room-based WebRTC signaling relay", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Durable-store call timeout in milliseconds
    #[arg(long, default_value = "3000")]
    store_timeout_ms: u64,

    /// Seconds between abandoned-room sweeps
    #[arg(long, default_value = "300")]
    sweep_interval_secs: u64,

    /// Seconds an empty room may linger before the sweeper deletes it
    #[arg(long, default_value = "600")]
    room_ttl_secs: u64,

    /// Capacity of the seeded lobby room
    #[arg(long, default_value = "30")]
    lobby_capacity: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let clock = Arc::new(SystemClock);

    // Wire dependencies in order:
    // 1. Repositories
    // 2. MessagePusher
    // 3. SignalingRouter
    // 4. RoomSweeper
    // 5. Server

    // 1. Repositories (in-memory stand-ins; a deployment backs these
    //    with the platform database the user/room services write to)
    let users = Arc::new(InMemoryUserRepository::new());
    let rooms = Arc::new(InMemoryRoomRepository::new());
    seed_demo_data(&users, &rooms, clock.as_ref(), args.lobby_capacity).await;

    // 2. MessagePusher (WebSocket implementation)
    let pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. SignalingRouter
    let router = Arc::new(SignalingRouter::new(
        users.clone(),
        rooms.clone(),
        pusher,
        clock.clone(),
        RouterConfig {
            store_timeout: Duration::from_millis(args.store_timeout_ms),
        },
    ));

    // 4. RoomSweeper
    let sweeper = RoomSweeper::new(
        rooms.clone(),
        clock.clone(),
        SweepConfig {
            interval: Duration::from_secs(args.sweep_interval_secs),
            room_ttl: Duration::from_secs(args.room_ttl_secs),
        },
    );
    tokio::spawn(sweeper.run());

    // 5. Create and run the server
    let server = Server::new(router, rooms);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Seed a lobby room and a few demo accounts so the relay is usable out
/// of the box. Real deployments read both stores from the platform
/// database instead.
async fn seed_demo_data(
    users: &InMemoryUserRepository,
    rooms: &InMemoryRoomRepository,
    clock: &SystemClock,
    lobby_capacity: usize,
) {
    use peerwave::common::time::Clock;

    let lobby = Room::new(
        RoomId::generate(),
        "lobby".to_string(),
        lobby_capacity,
        Timestamp::new(clock.now_millis()),
    );
    tracing::info!("Seeded lobby room '{}' (capacity {})", lobby.id, lobby_capacity);
    rooms.insert_room(lobby).await;

    for name in ["alice", "bob", "carol"] {
        users
            .insert_user(User {
                id: UserId::new(name.to_string()).expect("seed user id is non-empty"),
                display_name: name.to_string(),
            })
            .await;
    }
    tracing::info!("Seeded demo users: alice, bob, carol");
}
