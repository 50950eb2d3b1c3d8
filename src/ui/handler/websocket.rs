//! WebSocket connection handler.
//!
//! Accepts the upgrade, assigns a connection id, and runs the two
//! per-connection tasks: one draining client frames into the router,
//! one pushing queued server events out to the socket. When either
//! ends, the connection is torn down through the router exactly once:
//! transport disconnect is the single authoritative cleanup trigger.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::{ConnectionId, RoomId, UserId};
use crate::signaling::protocol::{ClientEvent, RelayKind};
use crate::signaling::{SignalingError, SignalingRouter};

use super::super::state::AppState;

/// Query parameters of the WebSocket handshake. The user identifier is
/// supplied out-of-band here; its absence is accepted but leaves the
/// connection unable to perform room operations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user_id))
}

/// Spawns the task that drains the connection's outbound queue into the
/// WebSocket sink.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Option<String>) {
    let connection_id = ConnectionId::generate();

    let user_id = match user_id {
        Some(raw) => match UserId::new(raw) {
            Ok(user_id) => Some(user_id),
            Err(_) => {
                tracing::warn!(
                    "Connection '{}' presented a blank user identifier; treating as anonymous",
                    connection_id
                );
                None
            }
        },
        None => None,
    };

    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    state
        .router
        .connect(connection_id.clone(), user_id, tx)
        .await;

    let mut send_task = pusher_loop(rx, sender);

    let router = state.router.clone();
    let recv_connection_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error on '{}': {}", recv_connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    dispatch_event(&router, &recv_connection_id, &text).await;
                }
                Message::Ping(_) => {
                    tracing::debug!("Received ping");
                    // Ping/pong is handled by the WebSocket protocol itself.
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", recv_connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // If either task completes, abort the other.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.router.disconnect(&connection_id).await;
}

async fn dispatch_event(router: &SignalingRouter, connection_id: &ConnectionId, raw: &str) {
    let event = match serde_json::from_str::<ClientEvent>(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Unparseable event from '{}': {}", connection_id, e);
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom { room_id, secret } => {
            let Ok(room_id) = RoomId::new(room_id) else {
                router
                    .report(connection_id, &SignalingError::RoomNotFound)
                    .await;
                return;
            };
            if let Err(e) = router.join_room(connection_id, &room_id, secret).await {
                tracing::warn!("join-room failed for '{}': {}", connection_id, e);
                router.report(connection_id, &e).await;
            }
        }
        ClientEvent::Offer { target, offer } => {
            relay(router, connection_id, target, RelayKind::Offer, offer).await;
        }
        ClientEvent::Answer { target, answer } => {
            relay(router, connection_id, target, RelayKind::Answer, answer).await;
        }
        ClientEvent::IceCandidate { target, candidate } => {
            relay(router, connection_id, target, RelayKind::IceCandidate, candidate).await;
        }
        ClientEvent::ScreenOffer { target, offer } => {
            relay(router, connection_id, target, RelayKind::ScreenOffer, offer).await;
        }
        ClientEvent::ScreenAnswer { target, answer } => {
            relay(router, connection_id, target, RelayKind::ScreenAnswer, answer).await;
        }
        ClientEvent::ScreenIceCandidate { target, candidate } => {
            relay(
                router,
                connection_id,
                target,
                RelayKind::ScreenIceCandidate,
                candidate,
            )
            .await;
        }
        ClientEvent::ScreenSharingStarted { room_id } => {
            screen_share(router, connection_id, room_id, true).await;
        }
        ClientEvent::ScreenSharingStopped { room_id } => {
            screen_share(router, connection_id, room_id, false).await;
        }
    }
}

async fn relay(
    router: &SignalingRouter,
    sender: &ConnectionId,
    target: String,
    kind: RelayKind,
    payload: Value,
) {
    match ConnectionId::new(target) {
        Ok(target) => router.relay(sender, &target, kind, payload).await,
        Err(_) => {
            // Same race as a vanished target: drop, don't surface.
            tracing::debug!("Dropping {:?} with a blank target from '{}'", kind, sender);
        }
    }
}

async fn screen_share(
    router: &SignalingRouter,
    connection_id: &ConnectionId,
    room_id: String,
    started: bool,
) {
    let Ok(room_id) = RoomId::new(room_id) else {
        tracing::warn!("Blank room id in screen-share event from '{}'", connection_id);
        return;
    };
    let result = if started {
        router.start_screen_share(connection_id, &room_id).await
    } else {
        router.stop_screen_share(connection_id, &room_id).await
    };
    if let Err(e) = result {
        tracing::warn!("Screen-share event failed for '{}': {}", connection_id, e);
        router.report(connection_id, &e).await;
    }
}
