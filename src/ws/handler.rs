//! WebSocket upgrade handlers
//!
//! `/play` carries the request/reply game protocol of one user. `/watch`
//! attaches a spectator to that user's notification mailbox.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use bytes::Bytes;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{Player, UserId};
use crate::http::middleware::{authenticate, AuthError, AuthenticatedUser};
use crate::notify::WriteError;
use crate::util::rate_limit::{ConnectionFloodGuard, OpLimits, RateLimitScope};
use crate::ws::dispatch::dispatch;
use crate::ws::protocol::{
    ClientPacket, ServerReply, STATUS_CONNECTION_OPEN, STATUS_INVALID_JSON,
};

/// Notification batches buffered per watcher before it counts as gone
const WATCH_BUFFER: usize = 64;

/// How long a detached watcher gets to receive what is still buffered
const WATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication, when no Authorization header is sent
    pub token: Option<String>,
}

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

/// Authenticate the upgrade request from its bearer header or `?token=`
fn authenticate_upgrade(
    state: &AppState,
    query: &WsQuery,
    bearer: BearerHeader,
) -> Result<AuthenticatedUser, AuthError> {
    match (&bearer, &query.token) {
        (Some(TypedHeader(Authorization(bearer))), _) => authenticate(state, bearer.token()),
        (None, Some(token)) => authenticate(state, token),
        (None, None) => Err(AuthError::MissingHeader),
    }
}

fn peer_ip(connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Play connection upgrade
pub async fn play_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    bearer: BearerHeader,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    match authenticate_upgrade(&state, &query, bearer) {
        Ok(user) => {
            info!(user_id = user.user_id, "Play upgrade for authenticated user");
            let ip = peer_ip(connect_info);
            ws.on_upgrade(move |socket| handle_play(socket, user.user_id, ip, state))
        }
        Err(e) => {
            warn!(error = %e, "Play connection auth failed");
            e.into_response()
        }
    }
}

/// Watch connection upgrade
pub async fn watch_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    bearer: BearerHeader,
    State(state): State<AppState>,
) -> Response {
    match authenticate_upgrade(&state, &query, bearer) {
        Ok(user) => {
            info!(user_id = user.user_id, "Watch upgrade for authenticated user");
            ws.on_upgrade(move |socket| handle_watch(socket, user.user_id, state))
        }
        Err(e) => {
            warn!(error = %e, "Watch connection auth failed");
            e.into_response()
        }
    }
}

/// Handle an upgraded play connection
async fn handle_play(socket: WebSocket, user_id: UserId, ip: String, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();

    let Some(session_id) = state.sessions.open(user_id) else {
        let reply = ServerReply::error("connection", STATUS_CONNECTION_OPEN);
        let _ = send_reply(&mut ws_sink, &reply).await;
        let _ = ws_sink.close().await;
        return;
    };

    let Some(player) = state.battle.player(user_id) else {
        error!(user_id, "Roster user has no player");
        state.sessions.close(user_id, session_id);
        return;
    };

    info!(user_id, session_id = %session_id, ip = %ip, "New play connection");
    state.distributor.push_info(user_id, true, &ip);

    run_play_session(&state, &player, ws_sink, ws_stream).await;

    state.distributor.push_info(user_id, false, &ip);
    state.sessions.close(user_id, session_id);
    info!(user_id, session_id = %session_id, "Play connection closed");
}

/// Reader loop: one reply per packet
async fn run_play_session(
    state: &AppState,
    player: &Player,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
) {
    let user_id = player.id();
    let flood_guard = ConnectionFloodGuard::new();
    let connection_limits = Mutex::new(OpLimits::new());
    let limits = match state.config.rate_limit_scope {
        RateLimitScope::PerUser => player.limits(),
        RateLimitScope::PerConnection => &connection_limits,
    };

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !flood_guard.check_inbound() {
                    warn!(user_id, "Inbound flood, dropping frame");
                    continue;
                }

                let reply = handle_packet(state, player, limits, &text);
                if let Err(e) = send_reply(&mut ws_sink, &reply).await {
                    debug!(user_id, error = %e, "WebSocket send failed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(user_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(user_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Parse, resolve and dispatch a single packet into its reply
pub fn handle_packet(
    state: &AppState,
    player: &Player,
    limits: &Mutex<OpLimits>,
    text: &str,
) -> ServerReply {
    let packet = match serde_json::from_str::<ClientPacket>(text) {
        Ok(packet) => packet,
        Err(e) => {
            debug!(user_id = player.id(), error = %e, "Failed to parse client packet");
            return ServerReply::error("invalid", STATUS_INVALID_JSON);
        }
    };
    let verb = packet.verb.clone();

    let outcome = packet
        .into_action()
        .and_then(|action| state.battle.resolve_with_limits(player, action, limits));

    match outcome {
        Ok(outcome) => match dispatch(&state.distributor, player, outcome) {
            Ok(obj) => ServerReply::ok(&verb, obj),
            Err(e) => {
                error!(user_id = player.id(), verb = %verb, error = %e, "Failed to build reply");
                ServerReply::error(&verb, "Internal server error")
            }
        },
        Err(e) => ServerReply::error(&verb, e.to_string()),
    }
}

/// Handle an upgraded watch connection
async fn handle_watch(socket: WebSocket, user_id: UserId, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Bytes>(WATCH_BUFFER);

    info!(user_id, "New watch connection");

    // Spawn writer task: notification batches -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            let text = String::from_utf8_lossy(&batch).into_owned();
            if let Err(e) = ws_sink.send(Message::Text(text)).await {
                debug!(user_id, error = %e, "Watch send failed");
                return;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Incoming frames only matter for detecting the close
    let mut reader_handle = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_stream.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    let sink = move |batch: Bytes| -> Result<(), WriteError> {
        match tx.try_send(batch) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(WriteError::Disconnected),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(WriteError::Other("watch buffer full".into()))
            }
        }
    };

    let battle = state.battle.clone();
    let debug_flag = state.config.watch_debug_flag;
    let attached = state
        .distributor
        .attach(user_id, sink, |client| {
            if debug_flag {
                client.push_flag("debug", true);
            }
            if let Some(player) = battle.player(user_id) {
                client.push_user_info(player.render_id());
            }
            if let Some(initial) = battle.initial_state(user_id) {
                client.push_initial(&initial);
            }
            client.push_stats(&battle.stats());
        });

    // The sink reports Disconnected once the writer exits. A closed reader
    // ends the session as well.
    let detached = tokio::select! {
        result = attached => {
            if let Err(e) = result {
                warn!(user_id, error = %e, "Watch attach refused");
            }
            true
        }
        _ = &mut reader_handle => {
            debug!(user_id, "Watcher went away");
            false
        }
    };

    // Once detached the sender is gone with the subscriber, so the writer
    // ends after the buffered batches are out.
    if detached
        && tokio::time::timeout(WATCH_DRAIN_TIMEOUT, &mut writer_handle)
            .await
            .is_err()
    {
        debug!(user_id, "Watch drain timed out");
    }
    writer_handle.abort();
    reader_handle.abort();
    info!(user_id, "Watch connection closed");
}

/// Send a reply over WebSocket
async fn send_reply(
    sink: &mut SplitSink<WebSocket, Message>,
    reply: &ServerReply,
) -> Result<(), String> {
    let json = serde_json::to_string(reply).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
